//! Test case routes
//!
//! `POST /:id/run` only queues the run; its outcome is read back from the
//! test case once a worker has recorded it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ApiError, ApiResult};
use super::state::{AppState, PageQuery};
use crate::catalog::TestCaseFilter;
use crate::harness::{RunStatus, RunTicket, TestCase};

#[derive(Debug, Default, Deserialize)]
pub struct TestCasesQuery {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub function_id: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of the 202 returned for a queued run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAccepted {
    pub message: String,
    pub test_case_id: u64,
    pub run_id: Uuid,
    pub queued_at: DateTime<Utc>,
}

impl From<RunTicket> for RunAccepted {
    fn from(ticket: RunTicket) -> Self {
        Self {
            message: "Test execution queued".to_string(),
            test_case_id: ticket.test_case_id,
            run_id: ticket.run_id,
            queued_at: ticket.queued_at,
        }
    }
}

pub fn test_cases_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_test_cases_handler).post(create_test_case_handler))
        .route(
            "/:id",
            get(get_test_case_handler)
                .put(update_test_case_handler)
                .delete(delete_test_case_handler),
        )
        .route("/:id/run", post(run_test_case_handler))
        .with_state(state)
}

async fn list_test_cases_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestCasesQuery>,
) -> ApiResult<Json<Vec<TestCase>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RunStatus>)
        .transpose()
        .map_err(ApiError::invalid)?;
    let filter = TestCaseFilter {
        function_id: query.function_id,
        status,
    };
    let page = PageQuery {
        skip: query.skip,
        limit: query.limit,
    }
    .page();
    Ok(Json(state.catalog.list_test_cases(filter, page)?))
}

async fn create_test_case_handler(
    State(state): State<Arc<AppState>>,
    Json(test_case): Json<TestCase>,
) -> ApiResult<(StatusCode, Json<TestCase>)> {
    let test_case = state.catalog.create_test_case(test_case)?;
    Ok((StatusCode::CREATED, Json(test_case)))
}

async fn get_test_case_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<TestCase>> {
    Ok(Json(state.catalog.get_test_case(id)?))
}

async fn update_test_case_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(test_case): Json<TestCase>,
) -> ApiResult<Json<TestCase>> {
    Ok(Json(state.catalog.update_test_case(id, test_case)?))
}

async fn delete_test_case_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_test_case(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_test_case_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<(StatusCode, Json<RunAccepted>)> {
    let ticket = state.queue.enqueue(id)?;
    Ok((StatusCode::ACCEPTED, Json(ticket.into())))
}
