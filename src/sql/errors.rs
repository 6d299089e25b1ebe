//! Identifier validation errors

use thiserror::Error;

/// Result type for statement construction
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors raised before any statement text is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// Table or column name outside the allow-list
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Column type outside the allow-list
    #[error("Invalid identifier: {0}")]
    InvalidType(String),
}

impl SqlError {
    /// The rejected input, as supplied
    pub fn rejected(&self) -> &str {
        match self {
            SqlError::InvalidIdentifier(s) | SqlError::InvalidType(s) => s,
        }
    }
}
