//! HTTP API tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::DOUBLE;
use serde_json::{json, Value};
use tabula::catalog::Catalog;
use tabula::functions::RuntimeConfig;
use tabula::harness::{RunQueue, RunWorkers, TestHarness};
use tabula::http_server::{AppState, HttpServer, HttpServerConfig};
use tabula::observability::MetricsRegistry;
use tabula::store::{MemStore, Store};
use tower::ServiceExt;

// =============================================================================
// Helpers
// =============================================================================

fn app() -> (Router, RunWorkers) {
    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let metrics = Arc::new(MetricsRegistry::new());
    let harness = Arc::new(TestHarness::new(
        store.clone(),
        RuntimeConfig::default(),
        metrics.clone(),
    ));
    let (queue, workers) = RunQueue::start(harness, 1);
    let state = AppState::new(Catalog::new(store), queue, metrics);
    let router = HttpServer::new(HttpServerConfig::default(), state).router();
    (router, workers)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Creates schema, tables, function and test case; returns the test case
async fn seed(app: &Router, expected: Value) -> Value {
    let (status, schema) = send(
        app,
        "POST",
        "/api/v1/objects",
        Some(json!({"name": "numbers", "attributes": {"value": "int"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let schema_id = schema["id"].as_u64().unwrap();

    let (_, t1) = send(
        app,
        "POST",
        "/api/v1/tables",
        Some(json!({"name": "t1", "object_id": schema_id, "data": [{"value": 3}]})),
    )
    .await;
    let (_, t2) = send(
        app,
        "POST",
        "/api/v1/tables",
        Some(json!({"name": "t2", "object_id": schema_id, "data": expected})),
    )
    .await;

    let (status, function) = send(
        app,
        "POST",
        "/api/v1/functions",
        Some(json!({
            "name": "double",
            "description": "doubles value",
            "input_schemas": {"x": schema_id},
            "output_schemas": {"y": schema_id},
            "implementation_kind": "interpreted-script",
            "implementation": DOUBLE,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, test_case) = send(
        app,
        "POST",
        "/api/v1/test-cases",
        Some(json!({
            "name": "doubles",
            "function_id": function["id"],
            "input_tables": {"x": t1["id"]},
            "expected_output_tables": {"y": t2["id"]},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    test_case
}

// =============================================================================
// Health and metrics
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _workers) = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_reflect_validation() {
    let (app, _workers) = app();
    send(
        &app,
        "POST",
        "/api/v1/objects",
        Some(json!({"name": "numbers", "attributes": {"value": "int"}})),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/objects/1/validate",
        Some(json!([{"value": 1}])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["rows"], 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/objects/1/validate",
        Some(json!([{"value": 1, "extra": 1}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TABULA_SCHEMA_MISMATCH");

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(metrics["tables_validated"], 1);
    assert_eq!(metrics["tables_rejected"], 1);
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_not_found_body() {
    let (app, _workers) = app();
    let (status, body) = send(&app, "GET", "/api/v1/tables/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Table 42 not found");
    assert_eq!(body["code"], "TABULA_NOT_FOUND");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_duplicate_schema_conflict() {
    let (app, _workers) = app();
    let schema = json!({"name": "numbers", "attributes": {"value": "int"}});
    send(&app, "POST", "/api/v1/objects", Some(schema.clone())).await;
    let (status, body) = send(&app, "POST", "/api/v1/objects", Some(schema)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_referenced_schema_is_immutable() {
    let (app, _workers) = app();
    seed(&app, json!([{"value": 6}])).await;

    let (status, _) = send(&app, "DELETE", "/api/v1/objects/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/objects/1",
        Some(json!({"name": "numbers", "attributes": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_test_case_binding_errors() {
    let (app, _workers) = app();
    let test_case = seed(&app, json!([{"value": 6}])).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/test-cases",
        Some(json!({
            "name": "bad",
            "function_id": test_case["function_id"],
            "input_tables": {"z": 1},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Input z not defined in function schema");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/test-cases",
        Some(json!({
            "name": "bad",
            "function_id": test_case["function_id"],
            "input_tables": {"x": 99},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Input table x (id: 99) not found");
}

// =============================================================================
// Runs
// =============================================================================

#[tokio::test]
async fn test_run_is_queued_and_recorded() {
    let (app, workers) = app();
    let test_case = seed(&app, json!([{"value": 6}])).await;
    let id = test_case["id"].as_u64().unwrap();
    assert_eq!(test_case["last_status"], "unset");

    let (status, ticket) = send(&app, "POST", &format!("/api/v1/test-cases/{}/run", id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ticket["message"], "Test execution queued");
    assert_eq!(ticket["test_case_id"], id);

    let uri = format!("/api/v1/test-cases/{}", id);
    let test_case = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let (status, test_case) = send(&app, "GET", &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            if test_case["last_status"] != "unset" {
                return test_case;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(test_case["last_status"], "passed");
    assert!(test_case["actual_output_tables"]["y"].is_u64());

    // Dropping the router closes the queue; workers drain it and exit
    drop(app);
    tokio::time::timeout(Duration::from_secs(30), workers.join())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_run_unknown_test_case() {
    let (app, _workers) = app();
    let (status, body) = send(&app, "POST", "/api/v1/test-cases/7/run", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Test case 7 not found");

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(metrics["runs_queued"], 0);
}

#[tokio::test]
async fn test_list_filters() {
    let (app, _workers) = app();
    seed(&app, json!([{"value": 6}])).await;

    let (status, tables) = send(&app, "GET", "/api/v1/tables?object_id=1&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tables.as_array().unwrap().len(), 1);

    let (_, cases) = send(&app, "GET", "/api/v1/test-cases?status=unset", None).await;
    assert_eq!(cases.as_array().unwrap().len(), 1);

    let (_, cases) = send(&app, "GET", "/api/v1/test-cases?status=passed", None).await;
    assert!(cases.as_array().unwrap().is_empty());

    let (status, body) = send(&app, "GET", "/api/v1/test-cases?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TABULA_INVALID");
}

#[tokio::test]
async fn test_function_validate_and_delete() {
    let (app, _workers) = app();
    let test_case = seed(&app, json!([{"value": 6}])).await;
    let function_uri = format!("/api/v1/functions/{}", test_case["function_id"]);

    let (status, body) = send(&app, "POST", &format!("{}/validate", function_uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = send(&app, "DELETE", &format!("/api/v1/test-cases/{}", test_case["id"]), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, "DELETE", &function_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &function_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
