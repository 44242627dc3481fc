//! # Execution Engine
//!
//! Binds input tables to a function's slots, invokes its implementation
//! and materializes the outputs as validated tables.
//!
//! Every output is checked before anything is written. If a write fails
//! midway, tables already created by the call are deleted again.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{FunctionError, FunctionResult};
use super::function::FunctionDef;
use super::invoker::{Implementation, Invokable};
use super::runtime::RuntimeConfig;
use crate::observability::{Event, Logger, MetricsRegistry, Timer};
use crate::schema::{rows_from_value, SchemaError, Table, TableValidator};
use crate::store::Store;

/// Name of the table materialized for `slot` of a test case run
pub fn output_table_name(test_case_id: u64, slot: &str) -> String {
    format!("test_case_{}_{}", test_case_id, slot)
}

/// Function executor over a shared store
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    store: Arc<dyn Store>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ExecutionEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Count invocations in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run `function` on `inputs` and persist one table per produced slot
    pub fn execute(
        &self,
        function: &FunctionDef,
        inputs: &BTreeMap<String, Table>,
        owner_test_case_id: u64,
        config: &RuntimeConfig,
    ) -> FunctionResult<BTreeMap<String, Table>> {
        let function_id = function.id.to_string();
        let test_case_id = owner_test_case_id.to_string();
        Logger::trace(
            Event::InvocationBegin.as_str(),
            &[
                ("function_id", function_id.as_str()),
                ("kind", function.implementation_kind.as_str()),
                ("test_case_id", test_case_id.as_str()),
            ],
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_invocations();
        }

        let timer = Timer::new();
        let result = self.invoke(function, inputs, owner_test_case_id, config);
        let duration_ms = timer.elapsed_ms();

        match &result {
            Ok(tables) => {
                let outputs = tables.len().to_string();
                Logger::info(
                    Event::InvocationComplete.as_str(),
                    &[
                        ("duration_ms", duration_ms.as_str()),
                        ("function_id", function_id.as_str()),
                        ("outputs", outputs.as_str()),
                        ("test_case_id", test_case_id.as_str()),
                    ],
                );
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_invocation_failures();
                }
                let error = err.to_string();
                Logger::warn(
                    Event::InvocationFailed.as_str(),
                    &[
                        ("duration_ms", duration_ms.as_str()),
                        ("error", error.as_str()),
                        ("error_code", err.kind().code()),
                        ("function_id", function_id.as_str()),
                        ("test_case_id", test_case_id.as_str()),
                    ],
                );
            }
        }
        result
    }

    fn invoke(
        &self,
        function: &FunctionDef,
        inputs: &BTreeMap<String, Table>,
        owner_test_case_id: u64,
        config: &RuntimeConfig,
    ) -> FunctionResult<BTreeMap<String, Table>> {
        let bound = bind_inputs(function, inputs)?;
        let implementation = Implementation::prepare(function)?;
        let outputs = implementation.call(&bound, config)?;

        if let Some(slot) = outputs
            .keys()
            .find(|slot| !function.output_schemas.contains_key(*slot))
        {
            return Err(FunctionError::UnexpectedOutput(slot.clone()));
        }

        let validator = TableValidator::new();
        let mut pending = Vec::with_capacity(outputs.len());
        for (slot, value) in &outputs {
            let schema_id = function.output_schemas[slot];
            let rows = rows_from_value(value).ok_or_else(|| {
                FunctionError::InvocationFailure(format!(
                    "output '{}' must be an array of row objects",
                    slot
                ))
            })?;
            let schema = self
                .store
                .get_schema(schema_id)?
                .ok_or_else(|| SchemaError::unknown_schema(schema_id))?;
            validator.validate(&rows, &schema).map_err(|e| {
                FunctionError::SchemaMismatch(format!("output '{}': {}", slot, e.message()))
            })?;

            let table = Table::new(output_table_name(owner_test_case_id, slot), schema_id, rows)
                .with_description(format!(
                    "Output '{}' of test case {}",
                    slot, owner_test_case_id
                ));
            pending.push((slot.clone(), table));
        }

        let mut created = BTreeMap::new();
        for (slot, table) in pending {
            match self.store.create_table(table) {
                Ok(table) => {
                    created.insert(slot, table);
                }
                Err(err) => {
                    self.discard(&created);
                    return Err(err.into());
                }
            }
        }
        Ok(created)
    }

    fn discard(&self, created: &BTreeMap<String, Table>) {
        for table in created.values() {
            if let Err(err) = self.store.delete_table(table.id) {
                let table_id = table.id.to_string();
                let error = err.to_string();
                Logger::error(
                    Event::InvocationFailed.as_str(),
                    &[("error", error.as_str()), ("orphaned_table_id", table_id.as_str())],
                );
            }
        }
    }
}

/// Map each declared input slot to its table's rows
fn bind_inputs(
    function: &FunctionDef,
    inputs: &BTreeMap<String, Table>,
) -> FunctionResult<BTreeMap<String, Value>> {
    if let Some(slot) = inputs
        .keys()
        .find(|slot| !function.input_schemas.contains_key(*slot))
    {
        return Err(FunctionError::InvalidBinding(format!(
            "Input '{}' is not declared by function '{}'",
            slot, function.name
        )));
    }

    let mut bound = BTreeMap::new();
    for (slot, schema_id) in &function.input_schemas {
        let table = inputs.get(slot).ok_or_else(|| {
            FunctionError::InvalidBinding(format!("Input '{}' is not bound to a table", slot))
        })?;
        if table.object_id != *schema_id {
            return Err(FunctionError::InvalidBinding(format!(
                "Input '{}' table {} has schema {}, function expects {}",
                slot, table.id, table.object_id, schema_id
            )));
        }
        let rows = table.data.iter().cloned().map(Value::Object).collect();
        bound.insert(slot.clone(), Value::Array(rows));
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::functions::ImplementationKind;
    use crate::schema::{rows_from_value, ObjectSchema};
    use crate::store::{MemStore, Snapshot, SnapshotAccess, StoreError, StoreResult};
    use serde_json::json;

    const DOUBLE: &str = r#"
        fn process(x) {
            let out = [];
            for row in x {
                out = push(out, {value: row.value * 2});
            }
            return {y: out, z: out};
        }
    "#;

    struct Fixture {
        store: Arc<dyn Store>,
        function: FunctionDef,
        inputs: BTreeMap<String, Table>,
    }

    fn fixture_on(store: Arc<dyn Store>, source: &str) -> Fixture {
        let schema = store
            .create_schema(ObjectSchema::with_fields("numbers", &[("value", "int")]))
            .unwrap();
        let input = store
            .create_table(Table::new(
                "in",
                schema.id,
                rows_from_value(&json!([{"value": 3}])).unwrap(),
            ))
            .unwrap();
        let function = store
            .create_function(
                FunctionDef::new("double", ImplementationKind::Script, source)
                    .with_input("x", schema.id)
                    .with_output("y", schema.id)
                    .with_output("z", schema.id),
            )
            .unwrap();
        Fixture {
            store,
            function,
            inputs: BTreeMap::from([("x".to_string(), input)]),
        }
    }

    fn fixture(source: &str) -> Fixture {
        fixture_on(Arc::new(MemStore::new()), source)
    }

    fn execute(f: &Fixture) -> FunctionResult<BTreeMap<String, Table>> {
        ExecutionEngine::new(f.store.clone()).execute(
            &f.function,
            &f.inputs,
            7,
            &RuntimeConfig::default(),
        )
    }

    #[test]
    fn test_outputs_are_persisted() {
        let f = fixture(DOUBLE);
        let metrics = Arc::new(MetricsRegistry::new());
        let outputs = ExecutionEngine::new(f.store.clone())
            .with_metrics(metrics.clone())
            .execute(&f.function, &f.inputs, 7, &RuntimeConfig::default())
            .unwrap();

        let y = &outputs["y"];
        assert_eq!(y.name, "test_case_7_y");
        assert_eq!(y.data, rows_from_value(&json!([{"value": 6}])).unwrap());
        assert_eq!(f.store.get_table(y.id).unwrap().unwrap(), *y);
        assert_eq!(metrics.snapshot().invocations, 1);
    }

    #[test]
    fn test_undeclared_output_rejected() {
        let f = fixture("fn process(x) { return {w: []}; }");
        let err = execute(&f).unwrap_err();
        assert!(matches!(err, FunctionError::UnexpectedOutput(ref s) if s == "w"));
        assert_eq!(f.store.list_tables().unwrap().len(), 1);
    }

    #[test]
    fn test_output_validated_against_schema() {
        let f = fixture("fn process(x) { return {y: [{value: 1, extra: 2}]}; }");
        let err = execute(&f).unwrap_err();
        assert!(matches!(err, FunctionError::SchemaMismatch(_)));
        assert!(err.to_string().contains("extra"));
        assert_eq!(f.store.list_tables().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_output() {
        let f = fixture("fn process(x) { return {y: [1, 2]}; }");
        assert!(matches!(
            execute(&f).unwrap_err(),
            FunctionError::InvocationFailure(_)
        ));
    }

    #[test]
    fn test_partial_outputs_allowed() {
        let f = fixture("fn process(x) { return {y: x}; }");
        let outputs = execute(&f).unwrap();
        assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["y"]);
    }

    #[test]
    fn test_binding_checks() {
        let mut f = fixture(DOUBLE);
        f.inputs.insert("extra".into(), f.inputs["x"].clone());
        assert!(matches!(
            execute(&f).unwrap_err(),
            FunctionError::InvalidBinding(_)
        ));

        let mut f = fixture(DOUBLE);
        f.inputs.clear();
        assert!(matches!(
            execute(&f).unwrap_err(),
            FunctionError::InvalidBinding(_)
        ));

        let mut f = fixture(DOUBLE);
        f.inputs.get_mut("x").unwrap().object_id = 99;
        assert!(matches!(
            execute(&f).unwrap_err(),
            FunctionError::InvalidBinding(_)
        ));
    }

    #[test]
    fn test_unsupported_kind() {
        let mut f = fixture(DOUBLE);
        f.function.implementation_kind = "python".into();
        assert!(matches!(
            execute(&f).unwrap_err(),
            FunctionError::UnsupportedImplementation(_)
        ));
    }

    /// Fails exactly the `fail_at`-th write
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemStore,
        writes: AtomicUsize,
        fail_at: usize,
    }

    impl SnapshotAccess for FlakyStore {
        fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> StoreResult<R> {
            self.inner.read(f)
        }

        fn write<R>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<R>) -> StoreResult<R> {
            if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
                return Err(StoreError::Io("disk full".into()));
            }
            self.inner.write(f)
        }
    }

    #[test]
    fn test_failed_write_rolls_back() {
        // schema, input, function and output y succeed; output z fails
        let store = Arc::new(FlakyStore {
            inner: MemStore::new(),
            writes: AtomicUsize::new(0),
            fail_at: 5,
        });
        let f = fixture_on(store.clone(), DOUBLE);

        let err = execute(&f).unwrap_err();
        assert!(matches!(err, FunctionError::Internal(_)));
        assert_eq!(store.list_tables().unwrap().len(), 1);
    }
}
