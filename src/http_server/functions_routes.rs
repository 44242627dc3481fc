//! Function routes

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::errors::ApiResult;
use super::state::{AppState, PageQuery};
use crate::catalog::FunctionValidation;
use crate::functions::FunctionDef;

pub fn functions_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_functions_handler).post(create_function_handler))
        .route(
            "/:id",
            get(get_function_handler)
                .put(update_function_handler)
                .delete(delete_function_handler),
        )
        .route("/:id/validate", post(validate_function_handler))
        .with_state(state)
}

async fn list_functions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<FunctionDef>>> {
    Ok(Json(state.catalog.list_functions(query.page())?))
}

async fn create_function_handler(
    State(state): State<Arc<AppState>>,
    Json(function): Json<FunctionDef>,
) -> ApiResult<(StatusCode, Json<FunctionDef>)> {
    let function = state.catalog.create_function(function)?;
    Ok((StatusCode::CREATED, Json(function)))
}

async fn get_function_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<FunctionDef>> {
    Ok(Json(state.catalog.get_function(id)?))
}

async fn update_function_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(function): Json<FunctionDef>,
) -> ApiResult<Json<FunctionDef>> {
    Ok(Json(state.catalog.update_function(id, function)?))
}

async fn delete_function_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_function(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Check definition completeness and pre-compile the implementation
async fn validate_function_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<FunctionValidation>> {
    Ok(Json(state.catalog.validate_function(id)?))
}
