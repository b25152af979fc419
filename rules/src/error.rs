use thiserror::Error;

/// Why a single rule was dropped. Never fatal to the compilation as a whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("unexpected end of rule, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("malformed number '{token}'")]
    BadNumber { token: String },
    #[error("expected {expected}, found '{found}'")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("unsupported {0}")]
    Unsupported(String),
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
    #[error("unknown cut class '{0}'")]
    UnknownCutClass(String),
    #[error("{0}")]
    Invalid(String),
}

impl RuleError {
    /// Unsupported branches are counted separately from malformed rules.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RuleError::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
