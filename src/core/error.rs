//! Engine Error Types
//!
//! The fixed taxonomy every operation failure is reported as. Messages
//! name the offending table, column or type and are what callers see.

use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::sql::SqlError;

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Message used when the payload is missing or has the wrong shape
pub const INVALID_PARAMETERS: &str = "Invalid url or parameters";

/// Classified operation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid API key")]
    Authorization,

    #[error("Table already exist: {0}")]
    DuplicateTable(String),

    #[error("Table does not exist: {0}")]
    UndefinedTable(String),

    #[error("Column already exist: {0}")]
    DuplicateColumn(String),

    #[error("Column does not exist: {0}")]
    UndefinedColumn(String),

    #[error("Invalid type: {0}")]
    UndefinedType(String),

    #[error("Existing column data is incompatible with prospect data type: {0}")]
    TypeConversion(String),

    #[error("Failed to execute SQL transaction")]
    FailedTransaction,

    #[error("Syntax error: {0}")]
    Syntax(String),
}

impl EngineError {
    /// Payload missing or malformed
    pub fn invalid_parameters() -> Self {
        Self::Syntax(INVALID_PARAMETERS.to_string())
    }

    /// Stable kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authorization => "AuthorizationError",
            Self::DuplicateTable(_) => "DuplicateTableError",
            Self::UndefinedTable(_) => "UndefinedTableError",
            Self::DuplicateColumn(_) => "DuplicateColumnError",
            Self::UndefinedColumn(_) => "UndefinedColumnError",
            Self::UndefinedType(_) => "UndefinedTypeError",
            Self::TypeConversion(_) => "TypeConversionError",
            Self::FailedTransaction => "FailedTransactionError",
            Self::Syntax(_) => "SyntaxError",
        }
    }

    /// Status carried in the error payload
    pub fn status_code(&self) -> u16 {
        500
    }

    /// `{"status": 500, "error": "..."}`
    pub fn to_json(&self) -> Value {
        json!({
            "status": self.status_code(),
            "error": self.to_string(),
        })
    }
}

impl From<SqlError> for EngineError {
    fn from(e: SqlError) -> Self {
        Self::Syntax(e.to_string())
    }
}

impl From<AuthError> for EngineError {
    fn from(_: AuthError) -> Self {
        Self::Authorization
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(_: serde_json::Error) -> Self {
        Self::invalid_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        assert_eq!(
            EngineError::DuplicateTable("pets".into()).to_string(),
            "Table already exist: pets"
        );
        assert_eq!(
            EngineError::UndefinedColumn("agee".into()).to_string(),
            "Column does not exist: agee"
        );
        assert_eq!(
            EngineError::TypeConversion("integer".into()).to_string(),
            "Existing column data is incompatible with prospect data type: integer"
        );
        assert_eq!(
            EngineError::invalid_parameters().to_string(),
            "Syntax error: Invalid url or parameters"
        );
    }

    #[test]
    fn test_identifier_rejection_is_syntax_error() {
        let err: EngineError = SqlError::InvalidIdentifier("a;b".into()).into();
        assert_eq!(err.to_string(), "Syntax error: Invalid identifier: a;b");
        assert_eq!(err.kind(), "SyntaxError");
    }

    #[test]
    fn test_payload_shape() {
        let payload = EngineError::Authorization.to_json();
        assert_eq!(payload, json!({"status": 500, "error": "Invalid API key"}));
    }
}
