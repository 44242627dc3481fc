//! # Catalog
//!
//! CRUD over object schemas, tables, functions and test cases with the
//! referential checks that keep them consistent:
//!
//! - schema names are unique and referenced schemas are immutable
//! - table rows are validated against their schema on every write
//! - function slots reference existing schemas
//! - test case bindings match the function's declared slots
//!
//! Catalog mutations are serialized so checks and writes see the same state.

mod errors;
mod functions;
mod schemas;
mod tables;
mod test_cases;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

pub use errors::{CatalogError, CatalogResult};
pub use functions::FunctionValidation;
pub use tables::TableFilter;
pub use test_cases::TestCaseFilter;

use crate::store::{Store, StoreError};

/// Pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }

    fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.skip).take(self.limit).collect()
    }
}

/// Entity catalog over a shared store
#[derive(Debug, Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
    writes: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Underlying store handle
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| StoreError::poisoned().into())
    }
}
