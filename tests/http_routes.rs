//! HTTP Route Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`:
//! - The API key travels in `x-api-key`
//! - Envelopes and bare lists come back as JSON bodies
//! - Unparsable bodies reach the engine as absent data
//! - Repeat requests to one route inside the window get 429

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tablegate::auth::ApiKeyVerifier;
use tablegate::core::{Engine, DEFAULT_OPERATION_TIMEOUT};
use tablegate::http_server::{HttpServer, HttpServerConfig, RateLimitConfig};
use tablegate::store::MemoryStore;
use tower::ServiceExt;

const KEY: &str = "s3cret";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_router() -> (MemoryStore, Arc<Engine>) {
    let store = MemoryStore::new();
    let engine = Arc::new(Engine::new(
        Arc::new(store.clone()),
        ApiKeyVerifier::from_key(KEY),
        DEFAULT_OPERATION_TIMEOUT,
    ));
    (store, engine)
}

fn router(engine: &Arc<Engine>) -> Router {
    HttpServer::new(HttpServerConfig::default(), engine.clone()).router()
}

async fn send(
    engine: &Arc<Engine>,
    method: Method,
    path: &str,
    key: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    send_to(router(engine), method, path, key, body).await
}

async fn send_to(
    router: Router,
    method: Method,
    path: &str,
    key: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// =============================================================================
// Route Tests
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_key() {
    let (_store, engine) = setup_router();

    let (status, body) = send(&engine, Method::GET, "/health", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["store"], json!("memory"));
}

#[tokio::test]
async fn test_missing_header_is_rejected() {
    let (store, engine) = setup_router();

    let (status, body) = send(
        &engine,
        Method::POST,
        "/api/v1/create-table",
        None,
        r#"{"table_name": "pets"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"status": 500, "error": "Invalid API key"}));
    assert_eq!(store.stats().sessions, 0);
}

#[tokio::test]
async fn test_create_and_list_over_http() {
    let (_store, engine) = setup_router();

    let (status, body) = send(
        &engine,
        Method::POST,
        "/api/v1/create-table",
        Some(KEY),
        r#"{"table_name": "Pets"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!("Table created successfully: pets"));

    let (status, body) = send(&engine, Method::GET, "/api/v1/tables", Some(KEY), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"table_schema": "public", "table_name": "pets", "table_type": "BASE TABLE"}])
    );
}

#[tokio::test]
async fn test_get_with_body_is_accepted() {
    let (_store, engine) = setup_router();
    send(
        &engine,
        Method::POST,
        "/api/v1/create-table",
        Some(KEY),
        r#"{"table_name": "pets"}"#,
    )
    .await;

    let (status, body) = send(
        &engine,
        Method::GET,
        "/api/v1/columns",
        Some(KEY),
        r#"{"table_name": "pets"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"column_name": "id", "column_order": 1, "column_type": "integer"}])
    );
}

#[tokio::test]
async fn test_unparsable_body_is_syntax_error() {
    let (_store, engine) = setup_router();

    let (status, body) = send(
        &engine,
        Method::POST,
        "/api/v1/insert-row",
        Some(KEY),
        "{table_name: pets",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Syntax error: Invalid url or parameters"));
}

#[tokio::test]
async fn test_list_tables_rejects_post() {
    let (_store, engine) = setup_router();

    let (status, _) = send(&engine, Method::POST, "/api/v1/tables", Some(KEY), "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_row_lifecycle_over_http() {
    let (_store, engine) = setup_router();
    let steps = [
        ("/api/v1/create-table", json!({"table_name": "pets"})),
        (
            "/api/v1/create-column",
            json!({"table_name": "pets", "column_name": "name", "column_type": "varchar(20)"}),
        ),
        ("/api/v1/insert-row", json!({"table_name": "pets", "row_data": {"name": "Rex"}})),
        ("/api/v1/insert-row", json!({"table_name": "pets", "row_data": {"name": "Rexina"}})),
    ];
    for (path, data) in steps {
        let (status, body) = send(&engine, Method::POST, path, Some(KEY), &data.to_string()).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", path, body);
    }

    let (_, body) = send(
        &engine,
        Method::POST,
        "/api/v1/select-row",
        Some(KEY),
        r#"{"table_name": "pets", "column_name": "name", "column_value": "Rex"}"#,
    )
    .await;
    assert_eq!(
        body,
        json!([{"id": 1, "name": "Rex"}, {"id": 2, "name": "Rexina"}])
    );

    let (_, body) = send(
        &engine,
        Method::POST,
        "/api/v1/delete-row",
        Some(KEY),
        r#"{"table_name": "pets", "row_id": 2}"#,
    )
    .await;
    assert_eq!(body["success"], json!("Row deleted successfully in table: pets"));

    let (_, body) = send(
        &engine,
        Method::POST,
        "/api/v1/rows",
        Some(KEY),
        r#"{"table_name": "pets"}"#,
    )
    .await;
    assert_eq!(body, json!([{"id": 1, "name": "Rex"}]));
}

// =============================================================================
// Rate Limit Tests
// =============================================================================

#[tokio::test]
async fn test_second_request_within_window_is_rejected() {
    let (store, engine) = setup_router();
    let router = router(&engine);

    let (status, _) = send_to(router.clone(), Method::GET, "/api/v1/tables", Some(KEY), "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send_to(router.clone(), Method::GET, "/api/v1/tables", Some(KEY), "").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body,
        json!({"status": 429, "error": "Too many requests: 1 per 1 second"})
    );
    assert_eq!(store.stats().sessions, 1);

    // Other routes and the health check keep their own budget
    let (status, _) = send_to(
        router.clone(),
        Method::POST,
        "/api/v1/create-table",
        Some(KEY),
        r#"{"table_name": "pets"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_to(router.clone(), Method::GET, "/health", None, "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_to(router, Method::GET, "/health", None, "").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_request_carries_retry_after() {
    let (_store, engine) = setup_router();
    let router = router(&engine);

    send_to(router.clone(), Method::GET, "/api/v1/tables", Some(KEY), "").await;
    let request = Request::builder()
        .uri("/api/v1/tables")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "1");
}

#[tokio::test]
async fn test_unlimited_config_admits_bursts() {
    let (_store, engine) = setup_router();
    let config = HttpServerConfig {
        rate_limit: RateLimitConfig::unlimited(),
        ..Default::default()
    };
    let router = HttpServer::new(config, engine).router();

    for _ in 0..5 {
        let (status, _) =
            send_to(router.clone(), Method::GET, "/api/v1/tables", Some(KEY), "").await;
        assert_eq!(status, StatusCode::OK);
    }
}
