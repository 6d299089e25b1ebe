//! Failure Classification
//!
//! Maps a store failure onto the engine taxonomy. The SQLSTATE picks the
//! kind; the subject named in the message comes from the store's
//! structured fields, then from the request's own identifiers, and only
//! then from the store's message text.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::error::{EngineError, INVALID_PARAMETERS};
use crate::store::StoreError;

/// Identifiers a request touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub table: Option<String>,
    pub column: Option<String>,
    pub new_column: Option<String>,
    pub column_type: Option<String>,
    /// Columns assigned by an insert or update
    pub columns: Vec<String>,
}

impl Targets {
    /// The only assigned column, if exactly one
    fn sole_column(&self) -> Option<String> {
        match self.columns.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

const TYPE_CONVERSION: &[&str] = &["42846", "42804", "22P02", "22003", "22007", "22008", "22018"];
const SYNTAX: &[&str] = &["42601", "42602", "42622"];

/// Classify a failure raised while a request was running
pub fn classify(err: &StoreError, targets: &Targets) -> EngineError {
    let Some(code) = err.code() else {
        debug!(error = %err, "store failure without SQLSTATE");
        return EngineError::FailedTransaction;
    };

    let message = err.message();
    let classified = match code {
        "42P07" => EngineError::DuplicateTable(
            targets
                .table
                .clone()
                .or_else(|| quoted_after("relation", message))
                .unwrap_or_default(),
        ),
        "42P01" => EngineError::UndefinedTable(
            targets
                .table
                .clone()
                .or_else(|| quoted_after("relation", message))
                .or_else(|| quoted_after("table", message))
                .unwrap_or_default(),
        ),
        "42701" => EngineError::DuplicateColumn(
            err.column()
                .map(str::to_string)
                .or_else(|| targets.new_column.clone())
                .or_else(|| targets.column.clone())
                .or_else(|| quoted_after("column", message))
                .unwrap_or_default(),
        ),
        "42703" => EngineError::UndefinedColumn(
            err.column()
                .map(str::to_string)
                .or_else(|| targets.column.clone())
                .or_else(|| targets.sole_column())
                .or_else(|| quoted_after("column", message))
                .or_else(|| targets.columns.first().cloned())
                .unwrap_or_default(),
        ),
        "42704" => EngineError::UndefinedType(
            err.datatype()
                .map(str::to_string)
                .or_else(|| targets.column_type.clone())
                .or_else(|| quoted_after("type", message))
                .unwrap_or_default(),
        ),
        c if TYPE_CONVERSION.contains(&c) => EngineError::TypeConversion(
            err.datatype()
                .map(str::to_string)
                .or_else(|| targets.column_type.clone())
                .or_else(|| type_in(message))
                .unwrap_or_default(),
        ),
        c if SYNTAX.contains(&c) => EngineError::Syntax(INVALID_PARAMETERS.to_string()),
        _ => EngineError::FailedTransaction,
    };

    debug!(
        sqlstate = code,
        store_message = message,
        kind = classified.kind(),
        "classified store failure"
    );
    classified
}

fn quoted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\b(relation|table|column|type) "([^"]+)""#).expect("quoted pattern compiles")
    })
}

fn type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:to|for) type ([a-z][a-z0-9_ ]*[a-z0-9_\])])|\bto ([a-z][a-z0-9_ ]*[a-z0-9_\])])$")
            .expect("type pattern compiles")
    })
}

/// First `keyword "name"` in a server message
fn quoted_after(keyword: &str, message: &str) -> Option<String> {
    quoted_pattern()
        .captures_iter(message)
        .find(|caps| &caps[1] == keyword)
        .map(|caps| caps[2].to_string())
}

/// Target type named by a conversion failure
fn type_in(message: &str) -> Option<String> {
    let caps = type_pattern().captures(message)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
}
