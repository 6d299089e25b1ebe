//! # Core Module
//!
//! The operation engine: one pipeline every call runs through, the
//! executor at its end, and the classification and formatting that turn
//! outcomes into responses.
//!
//! ## Flow
//!
//! - Auth middleware rejects calls whose key does not match
//! - Observe middleware opens a span and logs the outcome
//! - Normalize middleware lowercases identifiers in the payload
//! - The executor runs the statements in one transaction

pub mod classify;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod operation;
pub mod pipeline;
pub mod response;

pub use context::RequestContext;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use executor::{StatementExecutor, DEFAULT_OPERATION_TIMEOUT};
pub use middleware::Middleware;
pub use operation::{Operation, OperationKind, Request};
pub use pipeline::{Next, OperationExecutor, Pipeline};
pub use response::{Envelope, ErrorBody, Response};
