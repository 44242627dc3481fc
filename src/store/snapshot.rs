//! In-memory entity collections shared by every store backend

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use crate::functions::FunctionDef;
use crate::harness::TestCase;
use crate::schema::{ObjectSchema, Table};

/// An entity with a store-assigned id
pub trait Record: Clone {
    /// Entity name used in error messages
    const KIND: &'static str;

    fn id(&self) -> u64;
    fn assign_id(&mut self, id: u64);
    fn touch(&mut self);
}

macro_rules! impl_record {
    ($ty:ty, $kind:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> u64 {
                self.id
            }

            fn assign_id(&mut self, id: u64) {
                self.id = id;
            }

            fn touch(&mut self) {
                self.updated_at = Utc::now();
            }
        }
    };
}

impl_record!(ObjectSchema, "Object schema");
impl_record!(Table, "Table");
impl_record!(FunctionDef, "Function");
impl_record!(TestCase, "Test case");

/// Id-ordered collection with a monotonic id counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    next_id: u64,
    items: BTreeMap<u64, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            items: BTreeMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Insert with a fresh id; any id on `item` is overwritten
    pub fn insert(&mut self, mut item: T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        item.assign_id(id);
        self.items.insert(id, item.clone());
        item
    }

    pub fn get(&self, id: u64) -> Option<T> {
        self.items.get(&id).cloned()
    }

    /// Replace an existing item, keyed by its id
    pub fn update(&mut self, mut item: T) -> StoreResult<T> {
        let id = item.id();
        if !self.items.contains_key(&id) {
            return Err(StoreError::missing(T::KIND, id));
        }
        item.touch();
        self.items.insert(id, item.clone());
        Ok(item)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.items.remove(&id).is_some()
    }

    /// Remove and return an item
    pub fn take(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn list(&self) -> Vec<T> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every persisted entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub schemas: Collection<ObjectSchema>,
    #[serde(default)]
    pub tables: Collection<Table>,
    #[serde(default)]
    pub functions: Collection<FunctionDef>,
    #[serde(default)]
    pub test_cases: Collection<TestCase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut tables = Collection::<Table>::default();
        let a = tables.insert(Table::new("a", 1, vec![]));
        let b = tables.insert(Table::new("b", 1, vec![]));
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        tables.remove(b.id);
        let c = tables.insert(Table::new("c", 1, vec![]));
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_update_missing_fails() {
        let mut tables = Collection::<Table>::default();
        let mut orphan = Table::new("orphan", 1, vec![]);
        orphan.id = 42;
        let err = tables.update(orphan).unwrap_err();
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut snapshot = Snapshot::default();
        snapshot
            .schemas
            .insert(ObjectSchema::with_fields("s", &[("value", "int")]));
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.schemas.len(), 1);
        assert_eq!(restored.schemas.get(1).unwrap().name, "s");

        let mut restored = restored;
        let next = restored.schemas.insert(ObjectSchema::with_fields("t", &[]));
        assert_eq!(next.id, 2);
    }
}
