//! Error types for row computation

use tabula_formula::FormulaError;
use thiserror::Error;

/// Result type for tabula operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while computing derived columns
#[derive(Debug, Error)]
pub enum Error {
    /// Formula parse or evaluation error
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Formula or rollup column without its configuration payload
    #[error("Column {column} has no {kind} configuration")]
    MissingConfig { column: String, kind: &'static str },

    /// Rollup points at a relation column that is not in the schema
    #[error("Relation column not found: {0}")]
    UnknownRelationColumn(String),

    /// Rollup target is not a column of the related table
    #[error("Target column not found in related table: {0}")]
    UnknownTargetColumn(String),

    /// The relation resolver could not produce the related rows
    #[error("Cannot resolve relation {column}: {reason}")]
    Relation { column: String, reason: String },
}

impl Error {
    pub fn relation<C: Into<String>, R: Into<String>>(column: C, reason: R) -> Self {
        Error::Relation {
            column: column.into(),
            reason: reason.into(),
        }
    }
}
