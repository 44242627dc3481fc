//! Object schema operations

use super::{Catalog, CatalogError, CatalogResult, Page};
use crate::schema::ObjectSchema;

impl Catalog {
    /// Create a schema; names are unique
    pub fn create_schema(&self, mut schema: ObjectSchema) -> CatalogResult<ObjectSchema> {
        let _guard = self.lock()?;
        self.ensure_unique_name(&schema.name, None)?;
        schema.id = 0;
        Ok(self.store.create_schema(schema)?)
    }

    pub fn get_schema(&self, id: u64) -> CatalogResult<ObjectSchema> {
        self.store
            .get_schema(id)?
            .ok_or_else(|| CatalogError::not_found("Object", id))
    }

    pub fn list_schemas(&self, page: Page) -> CatalogResult<Vec<ObjectSchema>> {
        Ok(page.apply(self.store.list_schemas()?))
    }

    /// Replace name, description and attributes of an unreferenced schema
    pub fn update_schema(&self, id: u64, update: ObjectSchema) -> CatalogResult<ObjectSchema> {
        let _guard = self.lock()?;
        let mut schema = self.get_schema(id)?;
        self.ensure_unreferenced(id)?;
        self.ensure_unique_name(&update.name, Some(id))?;

        schema.name = update.name;
        schema.description = update.description;
        schema.attributes = update.attributes;
        Ok(self.store.update_schema(schema)?)
    }

    /// Delete an unreferenced schema
    pub fn delete_schema(&self, id: u64) -> CatalogResult<()> {
        let _guard = self.lock()?;
        self.get_schema(id)?;
        self.ensure_unreferenced(id)?;
        self.store.delete_schema(id)?;
        Ok(())
    }

    fn ensure_unique_name(&self, name: &str, except: Option<u64>) -> CatalogResult<()> {
        if name.trim().is_empty() {
            return Err(CatalogError::Invalid("Object name is required".into()));
        }
        let taken = self
            .store
            .list_schemas()?
            .iter()
            .any(|s| s.name == name && Some(s.id) != except);
        if taken {
            return Err(CatalogError::Conflict(format!(
                "Object schema '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    fn ensure_unreferenced(&self, id: u64) -> CatalogResult<()> {
        if let Some(table) = self.store.list_tables()?.iter().find(|t| t.object_id == id) {
            return Err(CatalogError::Conflict(format!(
                "Object schema {} is referenced by table {}",
                id, table.id
            )));
        }
        let functions = self.store.list_functions()?;
        if let Some(function) = functions
            .iter()
            .find(|f| f.referenced_schemas().any(|s| s == id))
        {
            return Err(CatalogError::Conflict(format!(
                "Object schema {} is referenced by function {}",
                id, function.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::Table;
    use crate::store::MemStore;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemStore::new()))
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let catalog = catalog();
        catalog
            .create_schema(ObjectSchema::with_fields("point", &[("x", "int")]))
            .unwrap();
        let err = catalog
            .create_schema(ObjectSchema::with_fields("point", &[("y", "int")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_update_unreferenced() {
        let catalog = catalog();
        let schema = catalog
            .create_schema(ObjectSchema::with_fields("point", &[("x", "int")]))
            .unwrap();
        let updated = catalog
            .update_schema(
                schema.id,
                ObjectSchema::with_fields("point", &[("x", "int"), ("y", "int")]),
            )
            .unwrap();
        assert!(updated.declares("y"));
        assert_eq!(updated.created_at, schema.created_at);
    }

    #[test]
    fn test_referenced_schema_is_immutable() {
        let catalog = catalog();
        let schema = catalog
            .create_schema(ObjectSchema::with_fields("point", &[("x", "int")]))
            .unwrap();
        catalog
            .create_table(Table::new("pts", schema.id, vec![]))
            .unwrap();

        let err = catalog
            .update_schema(schema.id, ObjectSchema::with_fields("point", &[]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            catalog.delete_schema(schema.id).unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_get_missing() {
        assert_eq!(catalog().get_schema(9).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
