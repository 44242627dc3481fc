//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use tabula::catalog::Catalog;
use tabula::functions::{FunctionDef, ImplementationKind, RuntimeConfig};
use tabula::harness::{TestCase, TestHarness};
use tabula::observability::MetricsRegistry;
use tabula::schema::{rows_from_value, ObjectSchema, Rows, Table};
use tabula::store::{MemStore, Store};

/// Doubles `value` of every input row
pub const DOUBLE: &str = r#"
    fn process(x) {
        let out = [];
        for row in x {
            out = push(out, {value: row.value * 2});
        }
        return {y: out};
    }
"#;

/// Produces nothing for the declared `y` slot
pub const FORGETS_Y: &str = "fn process(x) { return {}; }";

pub fn rows(value: Value) -> Rows {
    rows_from_value(&value).expect("fixture rows must be an array of objects")
}

/// Catalog and harness over one in-memory store
pub struct World {
    pub store: Arc<dyn Store>,
    pub catalog: Catalog,
    pub harness: Arc<TestHarness>,
    pub metrics: Arc<MetricsRegistry>,
}

impl World {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let harness = Arc::new(TestHarness::new(
            store.clone(),
            RuntimeConfig::default(),
            metrics.clone(),
        ));
        Self {
            catalog: Catalog::new(store.clone()),
            store,
            harness,
            metrics,
        }
    }

    pub fn numbers_schema(&self) -> ObjectSchema {
        self.catalog
            .create_schema(ObjectSchema::with_fields("numbers", &[("value", "int")]))
            .unwrap()
    }

    pub fn table(&self, name: &str, schema_id: u64, data: Value) -> Table {
        self.catalog
            .create_table(Table::new(name, schema_id, rows(data)))
            .unwrap()
    }

    pub fn function(&self, kind: ImplementationKind, source: &str, schema_id: u64) -> FunctionDef {
        self.catalog
            .create_function(
                FunctionDef::new("transform", kind, source)
                    .with_description("fixture")
                    .with_input("x", schema_id)
                    .with_output("y", schema_id),
            )
            .unwrap()
    }

    /// Schema `numbers`, input `[{value: 3}]`, expected `expected`
    pub fn doubling_case(&self, source: &str, expected: Value) -> TestCase {
        let schema = self.numbers_schema();
        let t1 = self.table("t1", schema.id, serde_json::json!([{"value": 3}]));
        let t2 = self.table("t2", schema.id, expected);
        let function = self.function(ImplementationKind::Script, source, schema.id);
        self.catalog
            .create_test_case(
                TestCase::new("doubles", function.id)
                    .with_input("x", t1.id)
                    .with_expected("y", t2.id),
            )
            .unwrap()
    }
}
