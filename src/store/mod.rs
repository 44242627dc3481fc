//! # Entity Store
//!
//! Persistence for object schemas, tables, functions and test cases.
//!
//! Ids are assigned per entity kind, starting at 1, and never reused.
//! `MemStore` keeps everything in memory; `FileStore` additionally writes
//! a checksummed snapshot to disk before any mutation becomes visible.

mod checksum;
mod errors;
mod file;
mod memory;
mod snapshot;

use std::fmt::Debug;

pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemStore;
pub use snapshot::{Collection, Record, Snapshot};

use crate::functions::FunctionDef;
use crate::harness::{RunRecord, TestCase};
use crate::schema::{ObjectSchema, Table};

/// Trait for entity storage
pub trait Store: Send + Sync + Debug {
    fn create_schema(&self, schema: ObjectSchema) -> StoreResult<ObjectSchema>;
    fn get_schema(&self, id: u64) -> StoreResult<Option<ObjectSchema>>;
    fn update_schema(&self, schema: ObjectSchema) -> StoreResult<ObjectSchema>;
    fn delete_schema(&self, id: u64) -> StoreResult<bool>;
    fn list_schemas(&self) -> StoreResult<Vec<ObjectSchema>>;

    fn create_table(&self, table: Table) -> StoreResult<Table>;
    fn get_table(&self, id: u64) -> StoreResult<Option<Table>>;
    fn update_table(&self, table: Table) -> StoreResult<Table>;
    fn delete_table(&self, id: u64) -> StoreResult<bool>;
    fn list_tables(&self) -> StoreResult<Vec<Table>>;

    fn create_function(&self, function: FunctionDef) -> StoreResult<FunctionDef>;
    fn get_function(&self, id: u64) -> StoreResult<Option<FunctionDef>>;
    fn update_function(&self, function: FunctionDef) -> StoreResult<FunctionDef>;
    fn delete_function(&self, id: u64) -> StoreResult<bool>;
    fn list_functions(&self) -> StoreResult<Vec<FunctionDef>>;

    fn create_test_case(&self, test_case: TestCase) -> StoreResult<TestCase>;
    fn get_test_case(&self, id: u64) -> StoreResult<Option<TestCase>>;
    fn update_test_case(&self, test_case: TestCase) -> StoreResult<TestCase>;
    fn delete_test_case(&self, id: u64) -> StoreResult<bool>;
    fn list_test_cases(&self) -> StoreResult<Vec<TestCase>>;

    /// Persist a whole test case record, run state included
    fn save_test_case(&self, test_case: TestCase) -> StoreResult<TestCase> {
        self.update_test_case(test_case)
    }

    /// Replace the client-owned fields of a stored test case in one write;
    /// run state is read and kept under the same lock
    fn update_test_case_definition(&self, id: u64, update: TestCase) -> StoreResult<TestCase>;

    /// Merge a finished run into the stored test case in one write.
    ///
    /// Returns the saved record and the previously owned table ids it no
    /// longer references.
    fn record_run(&self, id: u64, record: RunRecord) -> StoreResult<(TestCase, Vec<u64>)>;

    /// Remove a test case, returning the removed record
    fn take_test_case(&self, id: u64) -> StoreResult<Option<TestCase>>;
}

fn stored_test_case(snapshot: &Snapshot, id: u64) -> StoreResult<TestCase> {
    snapshot
        .test_cases
        .get(id)
        .ok_or_else(|| StoreError::missing(<TestCase as Record>::KIND, id))
}

/// Snapshot access shared by the store backends
pub trait SnapshotAccess: Send + Sync + Debug {
    /// Run `f` against the current snapshot
    fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> StoreResult<R>;

    /// Run `f` against a mutable snapshot; changes are kept only if `f` succeeds
    fn write<R>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<R>) -> StoreResult<R>;
}

macro_rules! collection_ops {
    ($field:ident, $ty:ty, $create:ident, $get:ident, $update:ident, $delete:ident, $list:ident) => {
        fn $create(&self, item: $ty) -> StoreResult<$ty> {
            self.write(|s| Ok(s.$field.insert(item)))
        }

        fn $get(&self, id: u64) -> StoreResult<Option<$ty>> {
            self.read(|s| s.$field.get(id))
        }

        fn $update(&self, item: $ty) -> StoreResult<$ty> {
            self.write(|s| s.$field.update(item))
        }

        fn $delete(&self, id: u64) -> StoreResult<bool> {
            self.write(|s| Ok(s.$field.remove(id)))
        }

        fn $list(&self) -> StoreResult<Vec<$ty>> {
            self.read(|s| s.$field.list())
        }
    };
}

impl<T: SnapshotAccess> Store for T {
    collection_ops!(
        schemas,
        ObjectSchema,
        create_schema,
        get_schema,
        update_schema,
        delete_schema,
        list_schemas
    );
    collection_ops!(
        tables,
        Table,
        create_table,
        get_table,
        update_table,
        delete_table,
        list_tables
    );
    collection_ops!(
        functions,
        FunctionDef,
        create_function,
        get_function,
        update_function,
        delete_function,
        list_functions
    );
    collection_ops!(
        test_cases,
        TestCase,
        create_test_case,
        get_test_case,
        update_test_case,
        delete_test_case,
        list_test_cases
    );

    fn update_test_case_definition(&self, id: u64, update: TestCase) -> StoreResult<TestCase> {
        self.write(|s| {
            let mut test_case = stored_test_case(s, id)?;
            test_case.apply_definition(update);
            s.test_cases.update(test_case)
        })
    }

    fn record_run(&self, id: u64, record: RunRecord) -> StoreResult<(TestCase, Vec<u64>)> {
        self.write(|s| {
            let mut test_case = stored_test_case(s, id)?;
            let superseded = test_case.apply_run(record);
            Ok((s.test_cases.update(test_case)?, superseded))
        })
    }

    fn take_test_case(&self, id: u64) -> StoreResult<Option<TestCase>> {
        self.write(|s| Ok(s.test_cases.take(id)))
    }
}
