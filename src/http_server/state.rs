//! Shared handler state

use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::{Catalog, Page};
use crate::harness::RunQueue;
use crate::observability::MetricsRegistry;

/// State shared by every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub queue: RunQueue,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    pub fn new(catalog: Catalog, queue: RunQueue, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            catalog,
            queue,
            metrics,
        }
    }
}

/// `skip` / `limit` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        let default = Page::default();
        Page::new(
            self.skip.unwrap_or(default.skip),
            self.limit.unwrap_or(default.limit),
        )
    }
}
