//! Identifier allow-listing
//!
//! Identifiers cannot be bound as parameters, so the only thing standing
//! between a caller-supplied name and the statement text is this check.
//! Inputs must already be lowercase; the normalizer runs first.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::errors::{SqlError, SqlResult};

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Upper bound on a column type declaration
pub const MAX_TYPE_LEN: usize = 64;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern compiles"))
}

fn type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[a-z][a-z0-9_]*(?: [a-z][a-z0-9_]*)*) ?(?:\( ?[0-9]+ ?(?:, ?[0-9]+ ?)?\))?(?:\[\])?$",
        )
        .expect("type pattern compiles")
    })
}

/// Type names that are spelled with more than one word
///
/// Any other multi-word declaration would let keywords such as
/// `references` or `not null` ride along into the DDL.
const MULTI_WORD_TYPES: &[&str] = &[
    "bit varying",
    "character varying",
    "double precision",
    "time with time zone",
    "time without time zone",
    "timestamp with time zone",
    "timestamp without time zone",
];

/// A validated table or column name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a normalized (lowercase) identifier
    pub fn parse(raw: &str) -> SqlResult<Self> {
        if raw.is_empty() || raw.len() > MAX_IDENTIFIER_LEN || !identifier_pattern().is_match(raw) {
            return Err(SqlError::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a name read back from the store catalog
    ///
    /// Catalog names were accepted by the store itself and may use any
    /// characters a quoted identifier allows, so they skip the allow-list.
    pub fn from_catalog(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Double-quoted form for statement text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated column type declaration, e.g. `integer`, `varchar(255)`,
/// `double precision`, `numeric(10, 2)`, `text[]`
///
/// Whether the type exists is for the store to decide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnType(String);

impl ColumnType {
    /// Validate a type declaration
    ///
    /// Surrounding whitespace is trimmed and runs of inner whitespace are
    /// collapsed. Type names are case-insensitive in SQL, so the input is
    /// lowercased here as well.
    pub fn parse(raw: &str) -> SqlResult<Self> {
        let collapsed = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        if collapsed.is_empty() || collapsed.len() > MAX_TYPE_LEN {
            return Err(SqlError::InvalidType(raw.to_string()));
        }

        let name = type_pattern()
            .captures(&collapsed)
            .and_then(|caps| caps.name("name"))
            .map(|m| m.as_str())
            .ok_or_else(|| SqlError::InvalidType(raw.to_string()))?;

        if name.contains(' ') && !MULTI_WORD_TYPES.contains(&name) {
            return Err(SqlError::InvalidType(raw.to_string()));
        }
        Ok(Self(collapsed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
