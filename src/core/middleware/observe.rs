//! Observability Middleware
//!
//! One span per operation carrying the request id and operation name;
//! the outcome and duration are logged when the operation finishes.

use std::future::Future;
use std::pin::Pin;

use tracing::{info, info_span, warn, Instrument};

use crate::core::context::RequestContext;
use crate::core::operation::Operation;
use crate::core::pipeline::{Next, OperationResult};

use super::Middleware;

/// Observability middleware
#[derive(Debug, Default)]
pub struct ObserveMiddleware;

impl Middleware for ObserveMiddleware {
    fn process<'a>(
        &'a self,
        op: &'a mut Operation,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
        let span = info_span!(
            "operation",
            request_id = %ctx.request_id,
            operation = %op.name,
        );

        Box::pin(
            async move {
                let table = op.table_name().unwrap_or("").to_string();
                let result = next.run(op, ctx).await;
                let duration_ms = ctx.elapsed_ms() as u64;

                match &result {
                    Ok(_) => info!(table = %table, duration_ms, "operation succeeded"),
                    Err(e) => warn!(
                        table = %table,
                        duration_ms,
                        kind = e.kind(),
                        error = %e,
                        "operation failed"
                    ),
                }
                result
            }
            .instrument(span),
        )
    }
}
