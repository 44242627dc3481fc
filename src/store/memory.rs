//! In-memory store

use std::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::snapshot::Snapshot;
use super::SnapshotAccess;

/// In-memory store for tests and ephemeral servers
#[derive(Debug, Default)]
pub struct MemStore {
    state: RwLock<Snapshot>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotAccess for MemStore {
    fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> StoreResult<R> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(f(&state))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<R>) -> StoreResult<R> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        f(&mut state)
    }
}
