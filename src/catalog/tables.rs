//! Table operations

use serde::{Deserialize, Serialize};

use super::{Catalog, CatalogError, CatalogResult, Page};
use crate::schema::{Row, SchemaError, Table, TableValidator};

/// List filter for tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    #[serde(default)]
    pub object_id: Option<u64>,
}

impl Catalog {
    /// Create a table after validating its rows
    pub fn create_table(&self, mut table: Table) -> CatalogResult<Table> {
        let _guard = self.lock()?;
        self.validate_table(&table.data, table.object_id)?;
        table.id = 0;
        Ok(self.store.create_table(table)?)
    }

    pub fn get_table(&self, id: u64) -> CatalogResult<Table> {
        self.store
            .get_table(id)?
            .ok_or_else(|| CatalogError::not_found("Table", id))
    }

    pub fn list_tables(&self, filter: TableFilter, page: Page) -> CatalogResult<Vec<Table>> {
        let tables = self
            .store
            .list_tables()?
            .into_iter()
            .filter(|t| filter.object_id.map_or(true, |id| t.object_id == id));
        Ok(page.apply(tables))
    }

    /// Replace a table's fields after validating the new rows
    pub fn update_table(&self, id: u64, update: Table) -> CatalogResult<Table> {
        let _guard = self.lock()?;
        let mut table = self.get_table(id)?;
        self.validate_table(&update.data, update.object_id)?;

        table.name = update.name;
        table.description = update.description;
        table.object_id = update.object_id;
        table.data = update.data;
        Ok(self.store.update_table(table)?)
    }

    pub fn delete_table(&self, id: u64) -> CatalogResult<()> {
        if !self.store.delete_table(id)? {
            return Err(CatalogError::not_found("Table", id));
        }
        Ok(())
    }

    /// Validate rows against a stored schema without writing anything
    pub fn validate_table(&self, rows: &[Row], schema_id: u64) -> CatalogResult<()> {
        let schema = self
            .store
            .get_schema(schema_id)?
            .ok_or_else(|| SchemaError::unknown_schema(schema_id))?;
        TableValidator::new().validate(rows, &schema)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{rows_from_value, ObjectSchema};
    use crate::store::MemStore;

    fn catalog_with_schema() -> (Catalog, u64) {
        let catalog = Catalog::new(Arc::new(MemStore::new()));
        let schema = catalog
            .create_schema(ObjectSchema::with_fields("s", &[("value", "int")]))
            .unwrap();
        (catalog, schema.id)
    }

    fn rows(value: serde_json::Value) -> Vec<Row> {
        rows_from_value(&value).unwrap()
    }

    #[test]
    fn test_extra_field_rejected_and_nothing_persisted() {
        let (catalog, schema_id) = catalog_with_schema();
        let table = Table::new("t", schema_id, rows(json!([{"value": 1, "extra": 2}])));
        let err = catalog.create_table(table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.to_string().contains("extra"));
        assert!(catalog.list_tables(TableFilter::default(), Page::default()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_schema_not_found() {
        let (catalog, _) = catalog_with_schema();
        let err = catalog.create_table(Table::new("t", 99, vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_revalidates() {
        let (catalog, schema_id) = catalog_with_schema();
        let table = catalog
            .create_table(Table::new("t", schema_id, rows(json!([{"value": 1}]))))
            .unwrap();
        let bad = Table::new("t", schema_id, rows(json!([{"nope": 1}])));
        assert!(catalog.update_table(table.id, bad).is_err());
        assert_eq!(catalog.get_table(table.id).unwrap().data, table.data);
    }

    #[test]
    fn test_filter_by_object() {
        let (catalog, schema_id) = catalog_with_schema();
        let other = catalog
            .create_schema(ObjectSchema::with_fields("o", &[]))
            .unwrap();
        catalog.create_table(Table::new("a", schema_id, vec![])).unwrap();
        catalog.create_table(Table::new("b", other.id, vec![])).unwrap();

        let filter = TableFilter {
            object_id: Some(other.id),
        };
        let names: Vec<_> = catalog
            .list_tables(filter, Page::default())
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b"]);
    }
}
