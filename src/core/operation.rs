//! Operation Model
//!
//! Every call names one of thirteen operations and carries an optional
//! JSON payload. The payload is decoded into a typed [`Request`] only
//! after authorization and normalization have run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::classify::Targets;
use super::error::{EngineError, EngineResult};
use crate::sql::{Assignment, ColumnType, Identifier, SqlValue};

/// The fixed operation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ListTables,
    CreateTable,
    DeleteTable,
    ListColumns,
    CreateColumn,
    DeleteColumn,
    UpdateColumnName,
    UpdateColumnType,
    ListRows,
    InsertRow,
    SelectRow,
    UpdateRow,
    DeleteRow,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        Self::ListTables,
        Self::CreateTable,
        Self::DeleteTable,
        Self::ListColumns,
        Self::CreateColumn,
        Self::DeleteColumn,
        Self::UpdateColumnName,
        Self::UpdateColumnType,
        Self::ListRows,
        Self::InsertRow,
        Self::SelectRow,
        Self::UpdateRow,
        Self::DeleteRow,
    ];

    /// Canonical wire name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::CreateTable => "create_table",
            Self::DeleteTable => "delete_table",
            Self::ListColumns => "list_columns",
            Self::CreateColumn => "create_column",
            Self::DeleteColumn => "delete_column",
            Self::UpdateColumnName => "update_column_name",
            Self::UpdateColumnType => "update_column_type",
            Self::ListRows => "list_rows",
            Self::InsertRow => "insert_row",
            Self::SelectRow => "select_row",
            Self::UpdateRow => "update_row",
            Self::DeleteRow => "delete_row",
        }
    }
}

impl FromStr for OperationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "list_tables" | "get_tables" => Self::ListTables,
            "create_table" => Self::CreateTable,
            "delete_table" => Self::DeleteTable,
            "list_columns" | "get_columns" => Self::ListColumns,
            "create_column" => Self::CreateColumn,
            "delete_column" => Self::DeleteColumn,
            "update_column_name" | "rename_column" => Self::UpdateColumnName,
            "update_column_type" => Self::UpdateColumnType,
            "list_rows" | "get_rows" => Self::ListRows,
            "insert_row" => Self::InsertRow,
            "select_row" | "select_rows" => Self::SelectRow,
            "update_row" => Self::UpdateRow,
            "delete_row" => Self::DeleteRow,
            _ => return Err(EngineError::invalid_parameters()),
        };
        Ok(kind)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation call as received from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name as supplied; may be an alias or unknown
    pub name: String,

    #[serde(default)]
    pub data: Option<Value>,
}

impl Operation {
    pub fn new(name: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Resolve the name; unknown names are a syntax error
    pub fn kind(&self) -> EngineResult<OperationKind> {
        self.name.parse()
    }

    /// `table_name` from the payload, if it is a string
    pub fn table_name(&self) -> Option<&str> {
        self.data.as_ref()?.get("table_name")?.as_str()
    }
}

// ==================
// Payloads
// ==================

#[derive(Debug, Deserialize)]
struct TablePayload {
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct ColumnPayload {
    table_name: String,
    column_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateColumnPayload {
    table_name: String,
    column_name: String,
    column_type: String,
}

#[derive(Debug, Deserialize)]
struct RenameColumnPayload {
    table_name: String,
    column_name: String,
    new_column_name: String,
}

#[derive(Debug, Deserialize)]
struct RetypeColumnPayload {
    table_name: String,
    column_name: String,
    new_column_type: String,
}

#[derive(Debug, Deserialize)]
struct InsertRowPayload {
    table_name: String,
    row_data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SelectRowPayload {
    table_name: String,
    column_name: String,
    column_value: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateRowPayload {
    table_name: String,
    row_id: Value,
    new_row_data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteRowPayload {
    table_name: String,
    row_id: Value,
}

fn decode<T: for<'de> Deserialize<'de>>(data: Option<&Value>) -> EngineResult<T> {
    let data = data.ok_or_else(EngineError::invalid_parameters)?;
    Ok(T::deserialize(data)?)
}

/// Row ids must be scalars
fn row_id(value: Value) -> EngineResult<Value> {
    match value {
        Value::String(_) | Value::Number(_) => Ok(value),
        _ => Err(EngineError::invalid_parameters()),
    }
}

fn assignments(row: &Map<String, Value>) -> EngineResult<Vec<Assignment>> {
    row.iter()
        .map(|(column, value)| Ok(Assignment::new(Identifier::parse(column)?, SqlValue::from_json(value))))
        .collect()
}

// ==================
// Requests
// ==================

/// A decoded, validated operation
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListTables,
    CreateTable {
        table: Identifier,
    },
    DeleteTable {
        table: Identifier,
    },
    ListColumns {
        table: Identifier,
    },
    CreateColumn {
        table: Identifier,
        column: Identifier,
        column_type: ColumnType,
    },
    DeleteColumn {
        table: Identifier,
        column: Identifier,
    },
    RenameColumn {
        table: Identifier,
        column: Identifier,
        new_column: Identifier,
    },
    RetypeColumn {
        table: Identifier,
        column: Identifier,
        column_type: ColumnType,
    },
    ListRows {
        table: Identifier,
    },
    InsertRow {
        table: Identifier,
        values: Vec<Assignment>,
        /// `row_data` as received, echoed back on success
        row: Map<String, Value>,
    },
    SelectRow {
        table: Identifier,
        column: Identifier,
        needle: SqlValue,
    },
    UpdateRow {
        table: Identifier,
        row_id: Value,
        values: Vec<Assignment>,
        row: Map<String, Value>,
    },
    DeleteRow {
        table: Identifier,
        row_id: Value,
    },
}

impl Request {
    /// Decode and validate the payload for `kind`
    pub fn parse(kind: OperationKind, data: Option<&Value>) -> EngineResult<Self> {
        let request = match kind {
            OperationKind::ListTables => Self::ListTables,
            OperationKind::CreateTable => {
                let p: TablePayload = decode(data)?;
                Self::CreateTable {
                    table: Identifier::parse(&p.table_name)?,
                }
            }
            OperationKind::DeleteTable => {
                let p: TablePayload = decode(data)?;
                Self::DeleteTable {
                    table: Identifier::parse(&p.table_name)?,
                }
            }
            OperationKind::ListColumns => {
                let p: TablePayload = decode(data)?;
                Self::ListColumns {
                    table: Identifier::parse(&p.table_name)?,
                }
            }
            OperationKind::CreateColumn => {
                let p: CreateColumnPayload = decode(data)?;
                Self::CreateColumn {
                    table: Identifier::parse(&p.table_name)?,
                    column: Identifier::parse(&p.column_name)?,
                    column_type: ColumnType::parse(&p.column_type)?,
                }
            }
            OperationKind::DeleteColumn => {
                let p: ColumnPayload = decode(data)?;
                Self::DeleteColumn {
                    table: Identifier::parse(&p.table_name)?,
                    column: Identifier::parse(&p.column_name)?,
                }
            }
            OperationKind::UpdateColumnName => {
                let p: RenameColumnPayload = decode(data)?;
                Self::RenameColumn {
                    table: Identifier::parse(&p.table_name)?,
                    column: Identifier::parse(&p.column_name)?,
                    new_column: Identifier::parse(&p.new_column_name)?,
                }
            }
            OperationKind::UpdateColumnType => {
                let p: RetypeColumnPayload = decode(data)?;
                Self::RetypeColumn {
                    table: Identifier::parse(&p.table_name)?,
                    column: Identifier::parse(&p.column_name)?,
                    column_type: ColumnType::parse(&p.new_column_type)?,
                }
            }
            OperationKind::ListRows => {
                let p: TablePayload = decode(data)?;
                Self::ListRows {
                    table: Identifier::parse(&p.table_name)?,
                }
            }
            OperationKind::InsertRow => {
                let p: InsertRowPayload = decode(data)?;
                Self::InsertRow {
                    table: Identifier::parse(&p.table_name)?,
                    values: assignments(&p.row_data)?,
                    row: p.row_data,
                }
            }
            OperationKind::SelectRow => {
                let p: SelectRowPayload = decode(data)?;
                Self::SelectRow {
                    table: Identifier::parse(&p.table_name)?,
                    column: Identifier::parse(&p.column_name)?,
                    needle: SqlValue::from_json(&p.column_value),
                }
            }
            OperationKind::UpdateRow => {
                let p: UpdateRowPayload = decode(data)?;
                if p.new_row_data.is_empty() {
                    return Err(EngineError::invalid_parameters());
                }
                Self::UpdateRow {
                    table: Identifier::parse(&p.table_name)?,
                    row_id: row_id(p.row_id)?,
                    values: assignments(&p.new_row_data)?,
                    row: p.new_row_data,
                }
            }
            OperationKind::DeleteRow => {
                let p: DeleteRowPayload = decode(data)?;
                Self::DeleteRow {
                    table: Identifier::parse(&p.table_name)?,
                    row_id: row_id(p.row_id)?,
                }
            }
        };
        Ok(request)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::ListTables => OperationKind::ListTables,
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DeleteTable { .. } => OperationKind::DeleteTable,
            Self::ListColumns { .. } => OperationKind::ListColumns,
            Self::CreateColumn { .. } => OperationKind::CreateColumn,
            Self::DeleteColumn { .. } => OperationKind::DeleteColumn,
            Self::RenameColumn { .. } => OperationKind::UpdateColumnName,
            Self::RetypeColumn { .. } => OperationKind::UpdateColumnType,
            Self::ListRows { .. } => OperationKind::ListRows,
            Self::InsertRow { .. } => OperationKind::InsertRow,
            Self::SelectRow { .. } => OperationKind::SelectRow,
            Self::UpdateRow { .. } => OperationKind::UpdateRow,
            Self::DeleteRow { .. } => OperationKind::DeleteRow,
        }
    }

    pub fn table(&self) -> Option<&Identifier> {
        match self {
            Self::ListTables => None,
            Self::CreateTable { table }
            | Self::DeleteTable { table }
            | Self::ListColumns { table }
            | Self::CreateColumn { table, .. }
            | Self::DeleteColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::RetypeColumn { table, .. }
            | Self::ListRows { table }
            | Self::InsertRow { table, .. }
            | Self::SelectRow { table, .. }
            | Self::UpdateRow { table, .. }
            | Self::DeleteRow { table, .. } => Some(table),
        }
    }

    /// Names a failure of this request may be attributed to
    pub fn targets(&self) -> Targets {
        let mut targets = Targets {
            table: self.table().map(Identifier::to_string),
            ..Targets::default()
        };
        match self {
            Self::CreateColumn {
                column, column_type, ..
            }
            | Self::RetypeColumn {
                column, column_type, ..
            } => {
                targets.column = Some(column.to_string());
                targets.column_type = Some(column_type.to_string());
            }
            Self::DeleteColumn { column, .. } | Self::SelectRow { column, .. } => {
                targets.column = Some(column.to_string());
            }
            Self::RenameColumn {
                column, new_column, ..
            } => {
                targets.column = Some(column.to_string());
                targets.new_column = Some(new_column.to_string());
            }
            Self::InsertRow { values, .. } | Self::UpdateRow { values, .. } => {
                targets.columns = values.iter().map(|a| a.column.to_string()).collect();
            }
            _ => {}
        }
        targets
    }

    /// Payload content echoed in the success envelope
    pub fn echo(&self) -> Value {
        match self {
            Self::InsertRow { row, .. } | Self::UpdateRow { row, .. } => Value::Object(row.clone()),
            Self::DeleteRow { row_id, .. } => json!({ "row_id": row_id }),
            _ => Value::String(String::new()),
        }
    }
}
