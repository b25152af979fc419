//! One parser per rule kind.
//!
//! Every parser consumes a single `;`-terminated statement and either returns the compiled
//! rule or a [`RuleError`]. Nothing is registered here; the compiler decides what to keep.

pub mod basic;
pub mod corner_spacing;
pub mod cut_class;
pub mod cut_spacing;
pub mod cut_spacing_table;
pub mod eol;
pub mod min_step;
pub mod spacing;

use crate::constraint::CutClass;
use crate::error::{Result, RuleError};
use crate::token::TokenStream;
use vroute_common::db::core::{LayerType, Tech};
use vroute_common::db::indices::LayerId;

/// What a parser may look at besides its own tokens.
pub struct ParseContext<'a> {
    pub tech: &'a Tech,
    pub layer: LayerId,
    /// Cut classes already compiled for `layer`.
    pub cut_classes: &'a [CutClass],
}

impl<'a> ParseContext<'a> {
    pub fn layer_named(&self, name: &str) -> Result<LayerId> {
        self.tech
            .layer_by_name(name)
            .ok_or_else(|| RuleError::UnknownLayer(name.to_string()))
    }

    pub fn cut_layer_named(&self, name: &str) -> Result<LayerId> {
        let id = self.layer_named(name)?;
        if self.tech.layer(id).layer_type != LayerType::Cut {
            return Err(RuleError::Invalid(format!("{} is not a cut layer", name)));
        }
        Ok(id)
    }

    pub fn require_cut_class(&self, name: &str) -> Result<()> {
        if self.cut_classes.iter().any(|c| c.name == name) {
            Ok(())
        } else {
            Err(RuleError::UnknownCutClass(name.to_string()))
        }
    }

    pub fn is_first_cut_layer(&self) -> bool {
        self.tech.is_first_cut_layer(self.layer)
    }
}

/// Fails on leftover tokens so that unknown trailing options drop the rule.
pub(crate) fn finish(ts: &TokenStream, context: &str) -> Result<()> {
    if ts.is_done() {
        Ok(())
    } else {
        Err(ts.unsupported(context))
    }
}
