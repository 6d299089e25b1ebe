//! Request Context
//!
//! Context carried through the execution pipeline.

use std::fmt;
use std::time::Instant;

use uuid::Uuid;

/// Context carried through the execution pipeline
#[derive(Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// API key presented by the caller
    pub api_key: Option<String>,

    /// Start time for duration tracking
    started_at: Instant,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            api_key,
            started_at: Instant::now(),
        }
    }

    /// Create a context with no key
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
