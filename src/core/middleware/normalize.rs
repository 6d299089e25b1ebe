//! Normalization Middleware
//!
//! Lowercases identifier fields of the payload before it is decoded.
//! PostgreSQL folds unquoted identifiers to lowercase and every statement
//! quotes its identifiers, so callers may write `Pets` and mean `pets`.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::core::context::RequestContext;
use crate::core::error::{EngineError, EngineResult};
use crate::core::operation::Operation;
use crate::core::pipeline::{Next, OperationResult};

use super::Middleware;

/// Top-level string fields that hold identifiers
const IDENTIFIER_FIELDS: &[&str] = &["table_name", "column_name", "new_column_name", "column_type"];

/// Mappings keyed by column name
const ROW_FIELDS: &[&str] = &["row_data", "new_row_data"];

fn lowercase_field(object: &mut Map<String, Value>, field: &str) {
    if let Some(Value::String(s)) = object.get_mut(field) {
        *s = s.to_lowercase();
    }
}

/// Lowercase identifiers in a payload in place
///
/// Absent fields and non-string values are left alone. Applying it twice
/// changes nothing. Row keys that collide once lowercased (`Name` and
/// `name`) fail with `DuplicateColumn` instead of dropping a value.
pub fn normalize_payload(data: &mut Value) -> EngineResult<()> {
    let Value::Object(object) = data else {
        return Ok(());
    };

    for field in IDENTIFIER_FIELDS {
        lowercase_field(object, field);
    }

    for field in ROW_FIELDS {
        if let Some(Value::Object(row)) = object.get_mut(*field) {
            let mut lowered = Map::with_capacity(row.len());
            for (key, value) in std::mem::take(row) {
                let key = key.to_lowercase();
                if lowered.contains_key(&key) {
                    return Err(EngineError::DuplicateColumn(key));
                }
                lowered.insert(key, value);
            }
            *row = lowered;
            lowercase_field(row, "column_name");
            lowercase_field(row, "column_type");
        }
    }
    Ok(())
}

/// Normalization middleware
#[derive(Debug, Default)]
pub struct NormalizeMiddleware;

impl Middleware for NormalizeMiddleware {
    fn process<'a>(
        &'a self,
        op: &'a mut Operation,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
        Box::pin(async move {
            if let Some(data) = op.data.as_mut() {
                normalize_payload(data)?;
            }
            next.run(op, ctx).await
        })
    }
}
