//! Statement Set
//!
//! Every statement the engine can issue. A statement is built from
//! validated identifiers plus bound values and rendered to PostgreSQL
//! text with `$n` placeholders; stores that do not speak SQL interpret
//! the variants directly.

use serde_json::Value;

use super::identifier::{ColumnType, Identifier};

/// Schema all catalog reads are scoped to
pub const DEFAULT_SCHEMA: &str = "public";

/// Primary key column created with every table
pub const ROW_ID_COLUMN: &str = "id";

/// A bound parameter value
///
/// Values are carried as text and left for the store to parse against the
/// target column type, the same way it treats a quoted literal. `None` is
/// SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlValue(Option<String>);

impl SqlValue {
    pub fn null() -> Self {
        Self(None)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    /// Convert a JSON payload value
    ///
    /// Strings bind as-is, `null` as SQL `NULL`, everything else as its
    /// JSON text (`3`, `true`, `[1,2]`).
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self(None),
            Value::String(s) => Self(Some(s.clone())),
            other => Self(Some(other.to_string())),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// `column = value` in an insert or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: Identifier,
    pub value: SqlValue,
}

impl Assignment {
    pub fn new(column: Identifier, value: SqlValue) -> Self {
        Self { column, value }
    }
}

/// Substring filter on a column's text representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contains {
    pub column: Identifier,
    pub needle: SqlValue,
}

/// The fixed statement set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Rows of `(table_schema, table_name, table_type)`
    ListTables,
    /// A single row holding one boolean
    TableExists { table: Identifier },
    CreateTable { table: Identifier },
    DropTable { table: Identifier },
    /// Rows of `(column_name, ordinal_position, data_type)` in ordinal order
    ListColumns { table: Identifier },
    AddColumn {
        table: Identifier,
        column: Identifier,
        column_type: ColumnType,
    },
    DropColumn { table: Identifier, column: Identifier },
    RenameColumn {
        table: Identifier,
        column: Identifier,
        new_column: Identifier,
    },
    /// Type change with an explicit cast of the existing data
    AlterColumnType {
        table: Identifier,
        column: Identifier,
        column_type: ColumnType,
    },
    /// One value per listed column, in the listed order
    SelectRows {
        table: Identifier,
        columns: Vec<Identifier>,
        filter: Option<Contains>,
    },
    InsertRow {
        table: Identifier,
        values: Vec<Assignment>,
    },
    UpdateRow {
        table: Identifier,
        row_id: SqlValue,
        values: Vec<Assignment>,
    },
    DeleteRow { table: Identifier, row_id: SqlValue },
}

impl Statement {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::TableExists { .. } => "table_exists",
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::ListColumns { .. } => "list_columns",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::AlterColumnType { .. } => "alter_column_type",
            Self::SelectRows { .. } => "select_rows",
            Self::InsertRow { .. } => "insert_row",
            Self::UpdateRow { .. } => "update_row",
            Self::DeleteRow { .. } => "delete_row",
        }
    }

    /// Whether the statement produces rows
    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            Self::ListTables | Self::TableExists { .. } | Self::ListColumns { .. } | Self::SelectRows { .. }
        )
    }

    /// Render to PostgreSQL text with `$n` placeholders matching [`Statement::params`]
    pub fn to_sql(&self) -> String {
        match self {
            Self::ListTables => format!(
                "SELECT table_schema::text, table_name::text, table_type::text \
                 FROM information_schema.tables WHERE table_schema = '{}' ORDER BY table_name",
                DEFAULT_SCHEMA
            ),
            Self::TableExists { .. } => format!(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = '{}' AND table_name = $1)",
                DEFAULT_SCHEMA
            ),
            Self::CreateTable { table } => {
                format!("CREATE TABLE {} ({} SERIAL PRIMARY KEY)", table.quoted(), ROW_ID_COLUMN)
            }
            Self::DropTable { table } => format!("DROP TABLE {}", table.quoted()),
            Self::ListColumns { .. } => format!(
                "SELECT column_name::text, ordinal_position::int4, data_type::text \
                 FROM information_schema.columns \
                 WHERE table_schema = '{}' AND table_name = $1 ORDER BY ordinal_position",
                DEFAULT_SCHEMA
            ),
            Self::AddColumn {
                table,
                column,
                column_type,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table.quoted(),
                column.quoted(),
                column_type
            ),
            Self::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", table.quoted(), column.quoted())
            }
            Self::RenameColumn {
                table,
                column,
                new_column,
            } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table.quoted(),
                column.quoted(),
                new_column.quoted()
            ),
            Self::AlterColumnType {
                table,
                column,
                column_type,
            } => format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                table.quoted(),
                column.quoted(),
                column_type,
                column.quoted(),
                column_type
            ),
            Self::SelectRows {
                table,
                columns,
                filter,
            } => {
                let projection = columns
                    .iter()
                    .map(|c| format!("to_jsonb({})", c.quoted()))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = if projection.is_empty() {
                    format!("SELECT FROM {}", table.quoted())
                } else {
                    format!("SELECT {} FROM {}", projection, table.quoted())
                };
                if let Some(filter) = filter {
                    sql.push_str(&format!(" WHERE strpos({}::text, $1) > 0", filter.column.quoted()));
                }
                sql
            }
            Self::InsertRow { table, values } => {
                if values.is_empty() {
                    return format!("INSERT INTO {} DEFAULT VALUES", table.quoted());
                }
                let columns = values
                    .iter()
                    .map(|a| a.column.quoted())
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=values.len())
                    .map(|i| format!("${}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("INSERT INTO {} ({}) VALUES ({})", table.quoted(), columns, placeholders)
            }
            Self::UpdateRow { table, values, .. } => {
                let assignments = values
                    .iter()
                    .enumerate()
                    .map(|(i, a)| format!("{} = ${}", a.column.quoted(), i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "UPDATE {} SET {} WHERE {} = ${}",
                    table.quoted(),
                    assignments,
                    ROW_ID_COLUMN,
                    values.len() + 1
                )
            }
            Self::DeleteRow { table, .. } => {
                format!("DELETE FROM {} WHERE {} = $1", table.quoted(), ROW_ID_COLUMN)
            }
        }
    }

    /// Bound values, in placeholder order
    pub fn params(&self) -> Vec<SqlValue> {
        match self {
            Self::TableExists { table } | Self::ListColumns { table } => {
                vec![SqlValue::text(table.as_str())]
            }
            Self::SelectRows {
                filter: Some(filter),
                ..
            } => vec![filter.needle.clone()],
            Self::InsertRow { values, .. } => values.iter().map(|a| a.value.clone()).collect(),
            Self::UpdateRow { values, row_id, .. } => values
                .iter()
                .map(|a| a.value.clone())
                .chain(std::iter::once(row_id.clone()))
                .collect(),
            Self::DeleteRow { row_id, .. } => vec![row_id.clone()],
            _ => Vec::new(),
        }
    }
}
