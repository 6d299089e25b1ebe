//! # Statement Construction
//!
//! Validated identifiers and the fixed statement set the engine can run.
//!
//! Identifiers (table names, column names, column types) are structural:
//! they are allow-listed and then written into statement text. Row values
//! never are; they travel as bound parameters.

pub mod errors;
pub mod identifier;
pub mod statement;

pub use errors::{SqlError, SqlResult};
pub use identifier::{ColumnType, Identifier};
pub use statement::{Assignment, Contains, SqlValue, Statement, DEFAULT_SCHEMA, ROW_ID_COLUMN};
