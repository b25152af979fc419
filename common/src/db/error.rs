use thiserror::Error;

/// Structural problems in the technology description. These stop the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TechError {
    #[error("via '{via}' references unknown layer '{layer}'")]
    ViaUnknownLayer { via: String, layer: String },
    #[error("via '{via}' has {count} layers, expected 3")]
    ViaLayerCount { via: String, count: usize },
    #[error("via '{via}' layers are not a consecutive routing/cut/routing stack")]
    ViaNonConsecutive { via: String },
    #[error("duplicate layer '{0}'")]
    DuplicateLayer(String),
    #[error("{owner} references unknown layer '{layer}'")]
    UnknownLayer { owner: String, layer: String },
    #[error("technology has no routing layers")]
    NoRoutingLayers,
}

/// Rejection of a guide file. A rejected import adds nothing.
#[derive(Debug, Error)]
pub enum GuideError {
    #[error("line {line}: unknown net '{name}'")]
    UnknownNet { line: usize, name: String },
    #[error("line {line}: unknown layer '{name}'")]
    UnknownLayer { line: usize, name: String },
    #[error("line {line}: layer '{name}' is outside the routing layer range")]
    LayerOutOfRange { line: usize, name: String },
    #[error("line {line}: guide rectangle before any net")]
    NoCurrentNet { line: usize },
    #[error("line {line}: malformed coordinate '{token}'")]
    BadCoordinate { line: usize, token: String },
    #[error("line {line}: expected 1 or 5 tokens, found {count}")]
    BadTokenCount { line: usize, count: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
