//! Response Formatting
//!
//! List reads answer with a bare array. Everything else answers with an
//! envelope whose fields are always present, defaulted to `""`.

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::EngineError;
use super::operation::Request;

/// Success envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: u16,
    pub success: String,
    pub table_name: String,
    pub column_name: String,
    pub new_column_name: String,
    pub new_column_type: String,
    pub data: Value,
}

impl Envelope {
    fn new(success: String) -> Self {
        Self {
            status: 200,
            success,
            table_name: String::new(),
            column_name: String::new(),
            new_column_name: String::new(),
            new_column_type: String::new(),
            data: Value::String(String::new()),
        }
    }

    /// Envelope for a completed mutation
    pub fn for_request(request: &Request) -> Self {
        let table = request.table().map(|t| t.to_string()).unwrap_or_default();
        let mut envelope = match request {
            Request::CreateTable { .. } => Self::new(format!("Table created successfully: {}", table)),
            Request::DeleteTable { .. } => Self::new(format!("Table deleted successfully: {}", table)),
            Request::CreateColumn { column, .. } => {
                let mut e = Self::new(format!(
                    "Column: {} created in table: {} successfully",
                    column, table
                ));
                e.column_name = column.to_string();
                e
            }
            Request::DeleteColumn { column, .. } => {
                let mut e = Self::new(format!(
                    "Column: {} deleted in table: {} successfully",
                    column, table
                ));
                e.column_name = column.to_string();
                e
            }
            Request::RenameColumn {
                column, new_column, ..
            } => {
                let mut e = Self::new(format!(
                    "Column: {} updated name to: {} in table: {}",
                    column, new_column, table
                ));
                e.column_name = column.to_string();
                e.new_column_name = new_column.to_string();
                e
            }
            Request::RetypeColumn {
                column, column_type, ..
            } => {
                let mut e = Self::new(format!(
                    "Column: {} updated type to: {} in table: {}",
                    column, column_type, table
                ));
                e.column_name = column.to_string();
                e.new_column_type = column_type.to_string();
                e
            }
            Request::InsertRow { .. } => Self::new(format!("Row inserted successfully in table: {}", table)),
            Request::UpdateRow { .. } => Self::new(format!("Row updated successfully in table: {}", table)),
            Request::DeleteRow { .. } => Self::new(format!("Row deleted successfully in table: {}", table)),
            // Reads never produce an envelope
            Request::ListTables
            | Request::ListColumns { .. }
            | Request::ListRows { .. }
            | Request::SelectRow { .. } => Self::new(String::new()),
        };
        envelope.table_name = table;
        envelope.data = request.echo();
        envelope
    }
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        Self {
            status: err.status_code(),
            error: err.to_string(),
        }
    }
}

/// Result of one engine call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    List(Vec<Map<String, Value>>),
    Success(Envelope),
    Error(ErrorBody),
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Self::List(_) => 200,
            Self::Success(e) => e.status,
            Self::Error(e) => e.status,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error(_))
    }

    /// Error message, for failed calls
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(&e.error),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<EngineError> for Response {
    fn from(err: EngineError) -> Self {
        Self::Error(ErrorBody::from(&err))
    }
}

/// Zip row cells against their column names
pub fn rows_to_objects(header: &[String], rows: Vec<Vec<Value>>) -> Vec<Map<String, Value>> {
    rows.into_iter()
        .map(|row| header.iter().cloned().zip(row).collect())
        .collect()
}
