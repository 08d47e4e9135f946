//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Syntax error produced by the lexer or parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at position {position})")]
pub struct ParseError {
    pub message: String,
    /// 0-based character offset into the formula text
    pub position: usize,
}

impl ParseError {
    pub fn new<S: Into<String>>(message: S, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// `prop("...")` names a column that does not exist
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Expression nested deeper than the configured limit
    #[error("Maximum evaluation depth of {0} exceeded")]
    MaxDepthExceeded(usize),
}
