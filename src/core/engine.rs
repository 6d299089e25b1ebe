//! Engine
//!
//! The single entry point callers use. Builds the pipeline once and turns
//! every outcome, failures included, into a [`Response`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::context::RequestContext;
use super::executor::StatementExecutor;
use super::middleware::{ApiKeyMiddleware, NormalizeMiddleware, ObserveMiddleware};
use super::operation::Operation;
use super::pipeline::Pipeline;
use super::response::Response;
use crate::auth::ApiKeyVerifier;
use crate::store::Store;

/// Schema and row manipulation engine
pub struct Engine {
    pipeline: Pipeline,
    store_kind: &'static str,
}

impl Engine {
    /// Assemble the pipeline: Auth → Observe → Normalize → Execute
    pub fn new(store: Arc<dyn Store>, verifier: ApiKeyVerifier, timeout: Duration) -> Self {
        let store_kind = store.kind();
        let pipeline = Pipeline::new(StatementExecutor::new(store, timeout))
            .with_middleware(ApiKeyMiddleware::new(verifier))
            .with_middleware(ObserveMiddleware)
            .with_middleware(NormalizeMiddleware);

        Self {
            pipeline,
            store_kind,
        }
    }

    /// Run one operation
    ///
    /// Never fails: errors come back as `{"status": 500, "error": ...}`.
    pub async fn call(&self, operation: &str, api_key: Option<&str>, data: Option<Value>) -> Response {
        let ctx = RequestContext::new(api_key.map(str::to_string));
        let op = Operation::new(operation, data);

        match self.pipeline.execute(op, ctx).await {
            Ok(response) => response,
            Err(e) => Response::from(e),
        }
    }

    /// Backing store name, for logs
    pub fn store_kind(&self) -> &'static str {
        self.store_kind
    }
}
