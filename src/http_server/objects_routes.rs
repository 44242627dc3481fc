//! Object schema routes

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use super::errors::{ApiError, ApiResult};
use super::state::{AppState, PageQuery};
use crate::observability::{Event, Logger};
use crate::schema::{rows_from_value, ObjectSchema};

/// Result of validating rows against a schema
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub object_id: u64,
    pub rows: usize,
}

pub fn objects_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_objects_handler).post(create_object_handler))
        .route(
            "/:id",
            get(get_object_handler)
                .put(update_object_handler)
                .delete(delete_object_handler),
        )
        .route("/:id/validate", post(validate_rows_handler))
        .with_state(state)
}

async fn list_objects_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<ObjectSchema>>> {
    Ok(Json(state.catalog.list_schemas(query.page())?))
}

async fn create_object_handler(
    State(state): State<Arc<AppState>>,
    Json(schema): Json<ObjectSchema>,
) -> ApiResult<(StatusCode, Json<ObjectSchema>)> {
    let schema = state.catalog.create_schema(schema)?;
    Ok((StatusCode::CREATED, Json(schema)))
}

async fn get_object_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ObjectSchema>> {
    Ok(Json(state.catalog.get_schema(id)?))
}

async fn update_object_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(schema): Json<ObjectSchema>,
) -> ApiResult<Json<ObjectSchema>> {
    Ok(Json(state.catalog.update_schema(id, schema)?))
}

async fn delete_object_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_schema(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_rows_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ValidationResponse>> {
    let rows = rows_from_value(&body)
        .ok_or_else(|| ApiError::invalid("Request body must be a JSON array of objects"))?;

    let object_id = id.to_string();
    match state.catalog.validate_table(&rows, id) {
        Ok(()) => {
            state.metrics.increment_tables_validated();
            let count = rows.len().to_string();
            Logger::info(
                Event::TableValidated.as_str(),
                &[("object_id", object_id.as_str()), ("rows", count.as_str())],
            );
            Ok(Json(ValidationResponse {
                valid: true,
                object_id: id,
                rows: rows.len(),
            }))
        }
        Err(err) => {
            state.metrics.increment_tables_rejected();
            let error = err.to_string();
            Logger::warn(
                Event::TableRejected.as_str(),
                &[("error", error.as_str()), ("object_id", object_id.as_str())],
            );
            Err(err.into())
        }
    }
}
