//! # Store
//!
//! The seam between the executor and the relational store.
//!
//! A [`Store`] hands out one [`Session`] per operation. The session owns a
//! single connection for its lifetime; the executor opens a transaction on
//! it, runs statements, and either commits or rolls back before dropping it.
//!
//! A session dropped with a transaction still open must not return its
//! connection to circulation with that transaction live.

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::sql::Statement;

pub mod errors;
pub mod memory;
pub mod postgres;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::{PgStore, PostgresConfig};

/// One result row; cells in projection order
pub type Row = Vec<Value>;

/// A connection checked out for one operation
pub trait Session: Send {
    /// Open a transaction
    fn begin(&mut self) -> BoxFuture<'_, StoreResult<()>>;

    /// Run a statement that returns no rows; yields the affected row count
    fn execute<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<u64>>;

    /// Run a statement that returns rows
    fn query<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<Vec<Row>>>;

    /// Commit the open transaction
    fn commit(&mut self) -> BoxFuture<'_, StoreResult<()>>;

    /// Discard the open transaction
    fn rollback(&mut self) -> BoxFuture<'_, StoreResult<()>>;
}

/// Source of sessions
pub trait Store: Send + Sync {
    /// Check out a session
    fn acquire(&self) -> BoxFuture<'_, StoreResult<Box<dyn Session>>>;

    /// Name for logs
    fn kind(&self) -> &'static str;
}
