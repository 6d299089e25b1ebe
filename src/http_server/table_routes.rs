//! Table HTTP Routes
//!
//! One route per engine operation. The API key travels in the
//! `x-api-key` header and the operation payload is the JSON body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, MethodRouter},
    Json, Router,
};
use serde_json::Value;

use super::rate_limit::{enforce_rate_limit, RateLimiter};
use crate::core::{Engine, OperationKind};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

// ==================
// Shared State
// ==================

/// Table state shared across handlers
pub struct TableState {
    pub engine: Arc<Engine>,
}

impl TableState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

// ==================
// Routes
// ==================

/// Create table routes, each limited by `limiter`
pub fn table_routes(state: Arc<TableState>, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/tables", operation_route(OperationKind::ListTables, false))
        .route("/create-table", operation_route(OperationKind::CreateTable, true))
        .route("/delete-table", operation_route(OperationKind::DeleteTable, true))
        .route("/columns", operation_route(OperationKind::ListColumns, true))
        .route("/create-column", operation_route(OperationKind::CreateColumn, true))
        .route("/delete-column", operation_route(OperationKind::DeleteColumn, true))
        .route(
            "/update-column-name",
            operation_route(OperationKind::UpdateColumnName, true),
        )
        .route(
            "/update-column-type",
            operation_route(OperationKind::UpdateColumnType, true),
        )
        .route("/rows", operation_route(OperationKind::ListRows, true))
        .route("/insert-row", operation_route(OperationKind::InsertRow, true))
        .route("/select-row", operation_route(OperationKind::SelectRow, true))
        .route("/update-row", operation_route(OperationKind::UpdateRow, true))
        .route("/delete-row", operation_route(OperationKind::DeleteRow, true))
        .route_layer(middleware::from_fn_with_state(limiter, enforce_rate_limit))
        .with_state(state)
}

/// GET (and optionally POST) handler dispatching to `kind`
fn operation_route(kind: OperationKind, accept_post: bool) -> MethodRouter<Arc<TableState>> {
    let handler = move |State(state): State<Arc<TableState>>, headers: HeaderMap, body: Bytes| async move {
        dispatch(&state, kind, &headers, &body).await
    };

    if accept_post {
        get(handler.clone()).post(handler)
    } else {
        get(handler)
    }
}

// ==================
// Handlers
// ==================

async fn dispatch(
    state: &TableState,
    kind: OperationKind,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, Json<Value>) {
    let api_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    let response = state.engine.call(kind.name(), api_key, parse_body(body)).await;

    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.to_json()))
}

/// Empty or unparsable bodies are treated as absent
fn parse_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(body).ok()
}
