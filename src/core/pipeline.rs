//! Execution Pipeline
//!
//! Every operation passes through the same middleware chain before it
//! reaches the executor: Auth → Observe → Normalize → Execute.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context::RequestContext;
use super::error::EngineResult;
use super::middleware::Middleware;
use super::operation::Operation;
use super::response::Response;

/// Result of an operation
pub type OperationResult = EngineResult<Response>;

/// Next middleware in chain
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    executor: &'a dyn OperationExecutor,
}

impl<'a> Next<'a> {
    /// Run the next middleware or executor
    pub fn run(
        self,
        op: &'a mut Operation,
        ctx: &'a mut RequestContext,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
        Box::pin(async move {
            if let Some((first, rest)) = self.middleware.split_first() {
                let next = Next {
                    middleware: rest,
                    executor: self.executor,
                };
                first.process(op, ctx, next).await
            } else {
                // End of middleware chain, execute operation
                self.executor.execute(op, ctx).await
            }
        })
    }
}

/// Operation executor (final stage of pipeline)
pub trait OperationExecutor: Send + Sync {
    /// Execute the operation
    fn execute<'a>(
        &'a self,
        op: &'a Operation,
        ctx: &'a RequestContext,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>>;
}

/// The unified execution pipeline
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    executor: Arc<dyn OperationExecutor>,
}

impl Pipeline {
    /// Create a new pipeline with the given executor
    pub fn new(executor: impl OperationExecutor + 'static) -> Self {
        Self {
            middleware: Vec::new(),
            executor: Arc::new(executor),
        }
    }

    /// Add middleware to the pipeline
    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(m));
        self
    }

    /// Execute an operation through the pipeline
    pub async fn execute(&self, mut op: Operation, mut ctx: RequestContext) -> OperationResult {
        let next = Next {
            middleware: &self.middleware,
            executor: self.executor.as_ref(),
        };
        next.run(&mut op, &mut ctx).await
    }

    /// Get the number of middleware stages
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::response::Envelope;

    /// Answers every operation with an empty success, counting calls
    #[derive(Default)]
    pub struct CountingExecutor {
        pub calls: std::sync::atomic::AtomicUsize,
        pub seen: std::sync::Mutex<Vec<Operation>>,
    }

    impl OperationExecutor for Arc<CountingExecutor> {
        fn execute<'a>(
            &'a self,
            op: &'a Operation,
            _ctx: &'a RequestContext,
        ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.seen.lock().unwrap().push(op.clone());
                let request = crate::core::operation::Request::ListTables;
                Ok(Response::Success(Envelope::for_request(&request)))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingExecutor;
    use super::*;

    #[tokio::test]
    async fn test_pipeline_with_no_middleware() {
        let executor = Arc::new(CountingExecutor::default());
        let pipeline = Pipeline::new(executor.clone());

        let result = pipeline
            .execute(Operation::new("list_tables", None), RequestContext::anonymous())
            .await;
        assert!(result.is_ok());
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(pipeline.middleware_count(), 0);
    }
}
