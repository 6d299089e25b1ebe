//! Liveness Route
//!
//! `GET /health` answers without a key and without touching the store.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::core::Engine;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    /// Backing store kind, `postgres` or `memory`
    pub store: &'static str,
}

/// `/health`, mounted at the root
pub fn health_routes(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(engine)
}

async fn health(State(engine): State<Arc<Engine>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: engine.store_kind(),
    })
}
