//! Table routes

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::errors::ApiResult;
use super::state::{AppState, PageQuery};
use crate::catalog::TableFilter;
use crate::schema::Table;

#[derive(Debug, Default, Deserialize)]
pub struct TablesQuery {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub object_id: Option<u64>,
}

pub fn tables_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_tables_handler).post(create_table_handler))
        .route(
            "/:id",
            get(get_table_handler)
                .put(update_table_handler)
                .delete(delete_table_handler),
        )
        .with_state(state)
}

async fn list_tables_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TablesQuery>,
) -> ApiResult<Json<Vec<Table>>> {
    let page = PageQuery {
        skip: query.skip,
        limit: query.limit,
    }
    .page();
    let filter = TableFilter {
        object_id: query.object_id,
    };
    Ok(Json(state.catalog.list_tables(filter, page)?))
}

async fn create_table_handler(
    State(state): State<Arc<AppState>>,
    Json(table): Json<Table>,
) -> ApiResult<(StatusCode, Json<Table>)> {
    let table = state.catalog.create_table(table)?;
    Ok((StatusCode::CREATED, Json(table)))
}

async fn get_table_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.catalog.get_table(id)?))
}

async fn update_table_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(table): Json<Table>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.catalog.update_table(id, table)?))
}

async fn delete_table_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_table(id)?;
    Ok(StatusCode::NO_CONTENT)
}
