//! Error types for tabula-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tabula-core
#[derive(Debug, Error)]
pub enum Error {
    /// Unrecognized column type tag
    #[error("Unknown column type: {0}")]
    UnknownColumnType(String),

    /// Unrecognized rollup aggregation name
    #[error("Unknown rollup function: {0}")]
    UnknownRollupFunction(String),
}
