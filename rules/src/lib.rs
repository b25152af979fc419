//! Design-rule constraint model.
//!
//! Per-layer rule text is compiled once into a [`RuleDb`]. After that the database is
//! read-only and can be shared between routing threads.

pub mod compile;
pub mod constraint;
pub mod db;
pub mod error;
pub mod parse;
pub mod table;
pub mod token;

pub use compile::{CompileReport, compile};
pub use constraint::{Constraint, ConstraintKind};
pub use db::RuleDb;
pub use error::RuleError;
