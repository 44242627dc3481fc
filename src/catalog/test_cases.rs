//! Test case operations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Catalog, CatalogError, CatalogResult, Page};
use crate::harness::{RunStatus, TestCase};

/// List filter for test cases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseFilter {
    #[serde(default)]
    pub function_id: Option<u64>,
    #[serde(default)]
    pub status: Option<RunStatus>,
}

impl Catalog {
    /// Create a test case whose bindings match the function's slots
    pub fn create_test_case(&self, mut test_case: TestCase) -> CatalogResult<TestCase> {
        let _guard = self.lock()?;
        let function = self.get_function(test_case.function_id)?;
        self.check_bindings(
            &function.input_schemas,
            &test_case.input_tables,
            "Input",
            "Input table",
        )?;
        self.check_bindings(
            &function.output_schemas,
            &test_case.expected_output_tables,
            "Output",
            "Expected output table",
        )?;

        test_case.id = 0;
        test_case.clear_run_state();
        Ok(self.store.create_test_case(test_case)?)
    }

    pub fn get_test_case(&self, id: u64) -> CatalogResult<TestCase> {
        self.store
            .get_test_case(id)?
            .ok_or_else(|| CatalogError::not_found("Test case", id))
    }

    pub fn list_test_cases(
        &self,
        filter: TestCaseFilter,
        page: Page,
    ) -> CatalogResult<Vec<TestCase>> {
        let test_cases = self.store.list_test_cases()?.into_iter().filter(|tc| {
            filter.function_id.map_or(true, |id| tc.function_id == id)
                && filter.status.map_or(true, |s| tc.last_status == s)
        });
        Ok(page.apply(test_cases))
    }

    /// Replace the client-owned fields; run results are left as they are
    pub fn update_test_case(&self, id: u64, update: TestCase) -> CatalogResult<TestCase> {
        let _guard = self.lock()?;
        self.get_test_case(id)?;
        let function = self.get_function(update.function_id)?;
        self.check_bindings(
            &function.input_schemas,
            &update.input_tables,
            "Input",
            "Input table",
        )?;
        self.check_bindings(
            &function.output_schemas,
            &update.expected_output_tables,
            "Output",
            "Expected output table",
        )?;

        Ok(self.store.update_test_case_definition(id, update)?)
    }

    /// Delete a test case and every table its runs produced.
    ///
    /// The record goes first, so a run finishing afterwards finds it gone
    /// and releases its own tables.
    pub fn delete_test_case(&self, id: u64) -> CatalogResult<()> {
        let _guard = self.lock()?;
        let test_case = self
            .store
            .take_test_case(id)?
            .ok_or_else(|| CatalogError::not_found("Test case", id))?;
        for table_id in test_case.actual_output_tables.values() {
            self.store.delete_table(*table_id)?;
        }
        Ok(())
    }

    fn check_bindings(
        &self,
        declared: &BTreeMap<String, u64>,
        bound: &BTreeMap<String, u64>,
        slot_label: &str,
        table_label: &str,
    ) -> CatalogResult<()> {
        for (slot, table_id) in bound {
            let schema_id = declared.get(slot).ok_or_else(|| {
                CatalogError::InvalidReference(format!(
                    "{} {} not defined in function schema",
                    slot_label, slot
                ))
            })?;
            let table = self.store.get_table(*table_id)?.ok_or_else(|| {
                CatalogError::NotFound(format!(
                    "{} {} (id: {}) not found",
                    table_label, slot, table_id
                ))
            })?;
            if table.object_id != *schema_id {
                return Err(CatalogError::InvalidReference(format!(
                    "{} {} schema does not match function definition",
                    table_label, slot
                )));
            }
        }
        Ok(())
    }
}
