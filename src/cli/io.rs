//! JSON I/O handling for CLI
//!
//! Output is one JSON document per line on stdout, UTF-8 only.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Parse a `--data` argument
pub fn parse_payload(raw: Option<&str>) -> CliResult<Option<Value>> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Err(CliError::io_error("Empty --data payload")),
        Some(s) => Ok(Some(serde_json::from_str(s)?)),
    }
}

/// Write a JSON value to stdout
pub fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
