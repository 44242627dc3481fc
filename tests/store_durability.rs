//! File store durability
//!
//! - Acknowledged writes survive reopen
//! - Ids are never reused across reopen
//! - Corrupted snapshots are refused on open
//! - No temporary file is left behind after a write

use std::fs;
use std::sync::Arc;

use serde_json::json;
use tabula::catalog::Catalog;
use tabula::functions::{FunctionDef, ImplementationKind};
use tabula::harness::{RunStatus, TestCase};
use tabula::schema::{rows_from_value, ObjectSchema, Table};
use tabula::store::{FileStore, Store, StoreError};
use tempfile::TempDir;

fn open(dir: &TempDir) -> FileStore {
    FileStore::open(dir.path()).expect("Failed to open store")
}

#[test]
fn test_acknowledged_writes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (schema_id, table_id, function_id, test_case_id) = {
        let store = open(&dir);
        let schema = store
            .create_schema(ObjectSchema::with_fields("numbers", &[("value", "int")]))
            .unwrap();
        let table = store
            .create_table(Table::new(
                "t1",
                schema.id,
                rows_from_value(&json!([{"value": 3}])).unwrap(),
            ))
            .unwrap();
        let function = store
            .create_function(
                FunctionDef::new("f", ImplementationKind::Script, "fn process(x) { return {}; }")
                    .with_input("x", schema.id),
            )
            .unwrap();
        let mut test_case = store
            .create_test_case(TestCase::new("tc", function.id).with_input("x", table.id))
            .unwrap();
        test_case.last_status = RunStatus::Failed;
        store.save_test_case(test_case.clone()).unwrap();
        (schema.id, table.id, function.id, test_case.id)
    };

    let store = open(&dir);
    assert_eq!(store.get_schema(schema_id).unwrap().unwrap().name, "numbers");
    assert_eq!(
        store.get_table(table_id).unwrap().unwrap().data,
        rows_from_value(&json!([{"value": 3}])).unwrap()
    );
    let function = store.get_function(function_id).unwrap().unwrap();
    assert_eq!(function.input_schemas["x"], schema_id);
    assert!(!function.implementation_hash.is_empty());
    assert_eq!(
        store.get_test_case(test_case_id).unwrap().unwrap().last_status,
        RunStatus::Failed
    );
}

#[test]
fn test_ids_not_reused_after_delete_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.create_table(Table::new("a", 1, vec![])).unwrap();
        let b = store.create_table(Table::new("b", 1, vec![])).unwrap();
        assert!(store.delete_table(b.id).unwrap());
    }

    let store = open(&dir);
    let c = store.create_table(Table::new("c", 1, vec![])).unwrap();
    assert_eq!(c.id, 3);
}

#[test]
fn test_checksum_mismatch_refused() {
    let dir = TempDir::new().unwrap();
    let path = {
        let store = open(&dir);
        store
            .create_schema(ObjectSchema::with_fields("numbers", &[("value", "int")]))
            .unwrap();
        store.path().to_path_buf()
    };

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("numbers", "Numbers")).unwrap();

    match FileStore::open(dir.path()) {
        Err(StoreError::Corrupted(message)) => assert!(message.contains("checksum")),
        other => panic!("expected corruption, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_truncated_snapshot_refused() {
    let dir = TempDir::new().unwrap();
    let path = {
        let store = open(&dir);
        store.create_table(Table::new("t", 1, vec![])).unwrap();
        store.path().to_path_buf()
    };

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        FileStore::open(dir.path()),
        Err(StoreError::Corrupted(_))
    ));
}

#[test]
fn test_no_temporary_file_left() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.create_table(Table::new("t", 1, vec![])).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["tabula.json".to_string()]);
}

#[test]
fn test_catalog_over_file_store() {
    let dir = TempDir::new().unwrap();
    {
        let catalog = Catalog::new(Arc::new(open(&dir)));
        catalog
            .create_schema(ObjectSchema::with_fields("numbers", &[("value", "int")]))
            .unwrap();
    }

    let catalog = Catalog::new(Arc::new(open(&dir)));
    let err = catalog
        .create_schema(ObjectSchema::with_fields("numbers", &[]))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}
