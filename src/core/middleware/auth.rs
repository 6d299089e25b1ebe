//! Authentication Middleware
//!
//! Rejects every operation whose API key does not hash to the configured
//! digest. Nothing downstream runs for a rejected call.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::auth::ApiKeyVerifier;
use crate::core::context::RequestContext;
use crate::core::error::EngineError;
use crate::core::operation::Operation;
use crate::core::pipeline::{Next, OperationResult};

use super::Middleware;

/// API key middleware
pub struct ApiKeyMiddleware {
    verifier: ApiKeyVerifier,
}

impl ApiKeyMiddleware {
    pub fn new(verifier: ApiKeyVerifier) -> Self {
        Self { verifier }
    }
}

impl Middleware for ApiKeyMiddleware {
    fn process<'a>(
        &'a self,
        op: &'a mut Operation,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
        Box::pin(async move {
            if let Err(e) = self.verifier.check(ctx.api_key.as_deref()) {
                warn!(
                    request_id = %ctx.request_id,
                    operation = %op.name,
                    key_present = ctx.api_key.is_some(),
                    "rejected API key"
                );
                return Err(EngineError::from(e));
            }

            next.run(op, ctx).await
        })
    }
}
