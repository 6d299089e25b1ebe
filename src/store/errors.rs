//! # Store Errors
//!
//! Failures reported by a store, before classification. Database
//! failures keep the SQLSTATE code and whatever structured fields the
//! server attached so the classifier rarely needs to read message text.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Raw store failure
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The server rejected a statement
    #[error("{message} (SQLSTATE {code})")]
    Database {
        /// Five-character SQLSTATE
        code: String,
        message: String,
        /// Column the server attributed the error to, if any
        column: Option<String>,
        /// Data type the server attributed the error to, if any
        datatype: Option<String>,
    },

    /// No session could be obtained, or the session broke
    #[error("Connection error: {0}")]
    Connection(String),

    /// A result row did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Create a database error with only a code and message
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.into(),
            message: message.into(),
            column: None,
            datatype: None,
        }
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Attach the column the failure concerns
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        if let Self::Database { column, .. } = &mut self {
            *column = Some(name.into());
        }
        self
    }

    /// Attach the data type the failure concerns
    pub fn with_datatype(mut self, name: impl Into<String>) -> Self {
        if let Self::Database { datatype, .. } = &mut self {
            *datatype = Some(name.into());
        }
        self
    }

    /// SQLSTATE, for database errors
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Server-supplied message text
    pub fn message(&self) -> &str {
        match self {
            Self::Database { message, .. } => message,
            Self::Connection(msg) | Self::Decode(msg) => msg,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Database { column, .. } => column.as_deref(),
            _ => None,
        }
    }

    pub fn datatype(&self) -> Option<&str> {
        match self {
            Self::Database { datatype, .. } => datatype.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Self::Database {
                code: db.code().code().to_string(),
                message: db.message().to_string(),
                column: db.column().map(str::to_string),
                datatype: db.datatype().map(str::to_string),
            },
            None if err.is_closed() => Self::Connection(err.to_string()),
            // Client-side failures (parameter encoding, row decoding)
            None => Self::Decode(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_fields() {
        let err = StoreError::database("42703", "column \"agee\" does not exist")
            .with_column("agee")
            .with_datatype("integer");

        assert_eq!(err.code(), Some("42703"));
        assert_eq!(err.column(), Some("agee"));
        assert_eq!(err.datatype(), Some("integer"));
        assert!(err.to_string().contains("SQLSTATE 42703"));
    }

    #[test]
    fn test_non_database_errors_have_no_code() {
        let err = StoreError::connection("pool exhausted").with_column("ignored");
        assert_eq!(err.code(), None);
        assert_eq!(err.column(), None);
        assert_eq!(err.message(), "pool exhausted");
    }
}
