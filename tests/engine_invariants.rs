//! Engine Invariant Tests
//!
//! End-to-end behavior of the engine over the in-process store:
//! - An invalid or absent API key changes nothing and runs nothing
//! - Every classified failure leaves tables and columns as they were
//! - Identifiers are lowercased, idempotently
//! - Row values are keyed by column name, not payload order
//! - Overlapping operations each keep their committed work
//! - An empty column listing is re-checked against table existence
//! - The walkthrough scenarios (create, duplicate, columns, rows, retype, auth)

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tablegate::auth::ApiKeyVerifier;
use tablegate::core::middleware::normalize_payload;
use tablegate::core::{Engine, OperationKind, Response, DEFAULT_OPERATION_TIMEOUT};
use tablegate::store::{MemoryStore, StoreError};

const KEY: &str = "correct horse battery staple";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> (MemoryStore, Engine) {
    let store = MemoryStore::new();
    let engine = Engine::new(
        Arc::new(store.clone()),
        ApiKeyVerifier::from_key(KEY),
        DEFAULT_OPERATION_TIMEOUT,
    );
    (store, engine)
}

async fn call(engine: &Engine, operation: &str, data: Value) -> Response {
    let data = if data.is_null() { None } else { Some(data) };
    engine.call(operation, Some(KEY), data).await
}

async fn table_names(engine: &Engine) -> Vec<String> {
    match call(engine, "list_tables", Value::Null).await {
        Response::List(rows) => rows
            .iter()
            .filter_map(|r| r.get("table_name").and_then(Value::as_str).map(str::to_string))
            .collect(),
        other => panic!("list_tables failed: {:?}", other),
    }
}

async fn columns(engine: &Engine, table: &str) -> Value {
    call(engine, "list_columns", json!({"table_name": table}))
        .await
        .to_json()
}

/// Tables plus the columns and rows of every table
async fn snapshot(engine: &Engine) -> Vec<(String, Value, Value)> {
    let mut out = Vec::new();
    for table in table_names(engine).await {
        let cols = columns(engine, &table).await;
        let rows = call(engine, "list_rows", json!({"table_name": table}))
            .await
            .to_json();
        out.push((table, cols, rows));
    }
    out
}

async fn pets_with_age(engine: &Engine) {
    assert!(call(engine, "create_table", json!({"table_name": "pets"})).await.is_success());
    assert!(call(
        engine,
        "create_column",
        json!({"table_name": "pets", "column_name": "age", "column_type": "integer"})
    )
    .await
    .is_success());
}

// =============================================================================
// Authorization Invariant
// =============================================================================

/// Absent and wrong keys get the same payload and never reach the store.
#[tokio::test]
async fn test_unauthorized_calls_touch_nothing() {
    let (store, engine) = setup_engine();
    let expected = json!({"status": 500, "error": "Invalid API key"});

    for kind in OperationKind::ALL {
        let data = Some(json!({"table_name": "pets", "column_name": "age"}));
        for key in [None, Some("wrong"), Some("")] {
            let response = engine.call(kind.name(), key, data.clone()).await;
            assert_eq!(response.to_json(), expected, "{} with {:?}", kind, key);
        }
    }

    let unknown = engine.call("drop_database", None, None).await;
    assert_eq!(unknown.to_json(), expected);

    let stats = store.stats();
    assert_eq!(stats.sessions, 0);
    assert_eq!(stats.statements, 0);
}

// =============================================================================
// Rollback Guarantee
// =============================================================================

/// Each classified failure leaves the catalog as it was before the call.
#[tokio::test]
async fn test_failures_leave_state_unchanged() {
    let (store, engine) = setup_engine();
    pets_with_age(&engine).await;
    assert!(call(
        &engine,
        "insert_row",
        json!({"table_name": "pets", "row_data": {"age": "3"}})
    )
    .await
    .is_success());

    let failures = [
        ("create_table", json!({"table_name": "pets"}), "Table already exist: pets"),
        ("delete_table", json!({"table_name": "ghost"}), "Table does not exist: ghost"),
        (
            "create_column",
            json!({"table_name": "pets", "column_name": "age", "column_type": "text"}),
            "Column already exist: age",
        ),
        (
            "delete_column",
            json!({"table_name": "pets", "column_name": "colour"}),
            "Column does not exist: colour",
        ),
        (
            "create_column",
            json!({"table_name": "pets", "column_name": "legs", "column_type": "quaternion"}),
            "Invalid type: quaternion",
        ),
        (
            "insert_row",
            json!({"table_name": "pets", "row_data": {"age": "old"}}),
            "Existing column data is incompatible with prospect data type: integer",
        ),
        (
            "create_column",
            json!({"table_name": "pets", "column_name": "legs"}),
            "Syntax error: Invalid url or parameters",
        ),
    ];

    for (operation, data, message) in failures {
        let before = snapshot(&engine).await;
        let response = call(&engine, operation, data).await;
        assert_eq!(response.error(), Some(message), "{}", operation);
        assert_eq!(snapshot(&engine).await, before, "{} changed state", operation);
    }

    // A dropped connection mid-statement also rolls back
    let before = snapshot(&engine).await;
    store.fail_next("add_column", StoreError::connection("connection reset"));
    let response = call(
        &engine,
        "create_column",
        json!({"table_name": "pets", "column_name": "name", "column_type": "text"}),
    )
    .await;
    assert_eq!(response.error(), Some("Failed to execute SQL transaction"));
    assert_eq!(snapshot(&engine).await, before);
}

/// A failed row update leaves the row as it was.
#[tokio::test]
async fn test_failed_update_keeps_row() {
    let (_store, engine) = setup_engine();
    pets_with_age(&engine).await;
    call(&engine, "insert_row", json!({"table_name": "pets", "row_data": {"age": 3}})).await;

    let response = call(
        &engine,
        "update_row",
        json!({"table_name": "pets", "row_id": 1, "new_row_data": {"age": "old"}}),
    )
    .await;
    assert_eq!(
        response.error(),
        Some("Existing column data is incompatible with prospect data type: integer")
    );

    let rows = call(&engine, "list_rows", json!({"table_name": "pets"})).await;
    assert_eq!(rows.to_json(), json!([{"id": 1, "age": 3}]));
}

// =============================================================================
// Round Trip
// =============================================================================

#[tokio::test]
async fn test_create_then_delete_round_trip() {
    let (_store, engine) = setup_engine();

    call(&engine, "create_table", json!({"table_name": "owners"})).await;
    assert_eq!(table_names(&engine).await, vec!["owners".to_string()]);

    let deleted = call(&engine, "delete_table", json!({"table_name": "owners"})).await;
    assert_eq!(
        deleted.to_json()["success"],
        json!("Table deleted successfully: owners")
    );
    assert!(table_names(&engine).await.is_empty());
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_normalization_is_idempotent() {
    let mut once = json!({
        "table_name": "Pets",
        "column_name": "AGE",
        "new_column_name": "Years",
        "row_data": {"Name": "Rex"}
    });
    normalize_payload(&mut once).unwrap();

    let mut twice = once.clone();
    normalize_payload(&mut twice).unwrap();

    assert_eq!(once, twice);
    assert_eq!(once["table_name"], json!("pets"));
    assert_eq!(once["row_data"], json!({"name": "Rex"}));
}

// =============================================================================
// Row Order
// =============================================================================

/// Payload key order never decides which column a value lands in.
#[tokio::test]
async fn test_row_values_keyed_by_column() {
    let (_store, engine) = setup_engine();
    call(&engine, "create_table", json!({"table_name": "notes"})).await;
    for column in ["alpha", "beta", "gamma"] {
        call(
            &engine,
            "create_column",
            json!({"table_name": "notes", "column_name": column, "column_type": "text"}),
        )
        .await;
    }

    call(
        &engine,
        "insert_row",
        json!({"table_name": "notes", "row_data": {"gamma": "g", "alpha": "a", "beta": "b"}}),
    )
    .await;

    let rows = call(&engine, "list_rows", json!({"table_name": "notes"})).await;
    assert_eq!(
        rows.to_json(),
        json!([{"id": 1, "alpha": "a", "beta": "b", "gamma": "g"}])
    );

    let selected = call(
        &engine,
        "select_row",
        json!({"table_name": "notes", "column_name": "beta", "column_value": "b"}),
    )
    .await;
    assert_eq!(selected, rows);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_create_lowercases_name() {
    let (_store, engine) = setup_engine();

    let created = call(&engine, "create_table", json!({"table_name": "Pets"})).await;
    assert_eq!(created.status(), 200);
    assert_eq!(created.to_json()["table_name"], json!("pets"));
    assert_eq!(table_names(&engine).await, vec!["pets".to_string()]);
}

#[tokio::test]
async fn test_scenario_duplicate_table() {
    let (_store, engine) = setup_engine();

    call(&engine, "create_table", json!({"table_name": "pets"})).await;
    let second = call(&engine, "create_table", json!({"table_name": "pets"})).await;
    assert_eq!(
        second.to_json(),
        json!({"status": 500, "error": "Table already exist: pets"})
    );
}

#[tokio::test]
async fn test_scenario_column_listing() {
    let (_store, engine) = setup_engine();
    call(&engine, "create_table", json!({"table_name": "pets"})).await;
    call(
        &engine,
        "create_column",
        json!({"table_name": "pets", "column_name": "Age", "column_type": "integer"}),
    )
    .await;

    let listed = columns(&engine, "pets").await;
    assert!(listed
        .as_array()
        .unwrap()
        .contains(&json!({"column_name": "age", "column_order": 2, "column_type": "integer"})));
}

#[tokio::test]
async fn test_scenario_insert_then_select() {
    let (_store, engine) = setup_engine();
    pets_with_age(&engine).await;

    let inserted = call(
        &engine,
        "insert_row",
        json!({"table_name": "pets", "row_data": {"age": "3"}}),
    )
    .await;
    assert_eq!(
        inserted.to_json()["success"],
        json!("Row inserted successfully in table: pets")
    );

    let selected = call(
        &engine,
        "select_row",
        json!({"table_name": "pets", "column_name": "age", "column_value": "3"}),
    )
    .await;
    assert_eq!(selected.to_json(), json!([{"id": 1, "age": 3}]));

    let missed = call(
        &engine,
        "select_row",
        json!({"table_name": "pets", "column_name": "age", "column_value": "4"}),
    )
    .await;
    assert_eq!(missed.to_json(), json!([]));
}

#[tokio::test]
async fn test_scenario_incompatible_retype() {
    let (_store, engine) = setup_engine();
    call(&engine, "create_table", json!({"table_name": "pets"})).await;
    call(
        &engine,
        "create_column",
        json!({"table_name": "pets", "column_name": "age", "column_type": "text"}),
    )
    .await;
    call(&engine, "insert_row", json!({"table_name": "pets", "row_data": {"age": "three"}})).await;

    let response = call(
        &engine,
        "update_column_type",
        json!({"table_name": "pets", "column_name": "age", "new_column_type": "integer"}),
    )
    .await;
    assert_eq!(
        response.error(),
        Some("Existing column data is incompatible with prospect data type: integer")
    );

    let listed = columns(&engine, "pets").await;
    assert!(listed
        .as_array()
        .unwrap()
        .contains(&json!({"column_name": "age", "column_order": 2, "column_type": "text"})));
}

#[tokio::test]
async fn test_scenario_missing_key() {
    let (store, engine) = setup_engine();

    let response = engine
        .call("create_table", None, Some(json!({"table_name": "pets"})))
        .await;
    assert_eq!(response.error(), Some("Invalid API key"));
    assert_eq!(store.stats().sessions, 0);
    assert!(table_names(&engine).await.is_empty());
}

// =============================================================================
// Row Mutations
// =============================================================================

#[tokio::test]
async fn test_update_and_delete_row() {
    let (_store, engine) = setup_engine();
    pets_with_age(&engine).await;
    call(&engine, "insert_row", json!({"table_name": "pets", "row_data": {"age": 3}})).await;

    let updated = call(
        &engine,
        "update_row",
        json!({"table_name": "pets", "row_id": "1", "new_row_data": {"Age": 4}}),
    )
    .await;
    assert_eq!(updated.to_json()["data"], json!({"age": 4}));

    let rows = call(&engine, "list_rows", json!({"table_name": "pets"})).await;
    assert_eq!(rows.to_json(), json!([{"id": 1, "age": 4}]));

    let deleted = call(&engine, "delete_row", json!({"table_name": "pets", "row_id": 1})).await;
    assert!(deleted.is_success());
    let rows = call(&engine, "list_rows", json!({"table_name": "pets"})).await;
    assert_eq!(rows.to_json(), json!([]));
}

#[tokio::test]
async fn test_rename_column() {
    let (_store, engine) = setup_engine();
    pets_with_age(&engine).await;

    let renamed = call(
        &engine,
        "update_column_name",
        json!({"table_name": "pets", "column_name": "age", "new_column_name": "Years"}),
    )
    .await;
    assert_eq!(
        renamed.to_json()["success"],
        json!("Column: age updated name to: years in table: pets")
    );

    let again = call(
        &engine,
        "update_column_name",
        json!({"table_name": "pets", "column_name": "years", "new_column_name": "id"}),
    )
    .await;
    assert_eq!(again.error(), Some("Column already exist: id"));
}

#[tokio::test]
async fn test_case_colliding_row_keys_rejected() {
    let (store, engine) = setup_engine();
    call(&engine, "create_table", json!({"table_name": "pets"})).await;
    call(
        &engine,
        "create_column",
        json!({"table_name": "pets", "column_name": "name", "column_type": "text"}),
    )
    .await;
    let statements = store.stats().statements;

    let response = call(
        &engine,
        "insert_row",
        json!({"table_name": "pets", "row_data": {"Name": "a", "name": "b"}}),
    )
    .await;
    assert_eq!(response.error(), Some("Column already exist: name"));
    assert_eq!(store.stats().statements, statements);

    let rows = call(&engine, "list_rows", json!({"table_name": "pets"})).await;
    assert_eq!(rows.to_json(), json!([]));
}

// =============================================================================
// Concurrency
// =============================================================================

/// Two overlapping successes are both visible afterwards.
#[tokio::test]
async fn test_overlapping_creates_both_persist() {
    let (store, engine) = setup_engine();
    store.set_statement_delay(Some(Duration::from_millis(50)));

    let (alpha, beta) = tokio::join!(
        call(&engine, "create_table", json!({"table_name": "alpha"})),
        call(&engine, "create_table", json!({"table_name": "beta"})),
    );
    assert!(alpha.is_success(), "{:?}", alpha);
    assert!(beta.is_success(), "{:?}", beta);

    store.set_statement_delay(None);
    assert_eq!(
        table_names(&engine).await,
        vec!["alpha".to_string(), "beta".to_string()]
    );
}

// =============================================================================
// Table Existence Re-check
// =============================================================================

#[tokio::test]
async fn test_columns_of_missing_table() {
    let (_store, engine) = setup_engine();

    let listed = call(&engine, "list_columns", json!({"table_name": "ghost"})).await;
    assert_eq!(listed.error(), Some("Table does not exist: ghost"));

    let rows = call(&engine, "list_rows", json!({"table_name": "ghost"})).await;
    assert_eq!(rows.error(), Some("Table does not exist: ghost"));
}

/// A table with every column dropped still exists and lists nothing.
#[tokio::test]
async fn test_columnless_table_lists_empty() {
    let (_store, engine) = setup_engine();
    call(&engine, "create_table", json!({"table_name": "bare"})).await;
    let dropped = call(
        &engine,
        "delete_column",
        json!({"table_name": "bare", "column_name": "id"}),
    )
    .await;
    assert!(dropped.is_success(), "{:?}", dropped);

    let listed = call(&engine, "list_columns", json!({"table_name": "bare"})).await;
    assert_eq!(listed, Response::List(vec![]));

    let rows = call(&engine, "list_rows", json!({"table_name": "bare"})).await;
    assert_eq!(rows, Response::List(vec![]));
}
