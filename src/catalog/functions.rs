//! Function operations

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::{Catalog, CatalogError, CatalogResult, Page};
use crate::functions::{FunctionDef, Implementation};

/// Outcome of a successful function validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionValidation {
    pub valid: bool,
    pub function_id: u64,
    pub implementation_kind: String,
}

fn slot_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid slot regex"))
}

impl Catalog {
    /// Register a function; every slot must name an existing schema
    pub fn create_function(&self, mut function: FunctionDef) -> CatalogResult<FunctionDef> {
        let _guard = self.lock()?;
        self.check_function(&function)?;
        function.id = 0;
        function.refresh_hash();
        Ok(self.store.create_function(function)?)
    }

    pub fn get_function(&self, id: u64) -> CatalogResult<FunctionDef> {
        self.store
            .get_function(id)?
            .ok_or_else(|| CatalogError::not_found("Function", id))
    }

    pub fn list_functions(&self, page: Page) -> CatalogResult<Vec<FunctionDef>> {
        Ok(page.apply(self.store.list_functions()?))
    }

    /// Replace a function's definition, keeping id and creation time
    pub fn update_function(&self, id: u64, update: FunctionDef) -> CatalogResult<FunctionDef> {
        let _guard = self.lock()?;
        let mut function = self.get_function(id)?;
        self.check_function(&update)?;

        function.name = update.name;
        function.description = update.description;
        function.input_schemas = update.input_schemas;
        function.output_schemas = update.output_schemas;
        function.implementation_kind = update.implementation_kind;
        function.parameters = update.parameters;
        function.update_implementation(update.implementation);
        Ok(self.store.update_function(function)?)
    }

    pub fn delete_function(&self, id: u64) -> CatalogResult<()> {
        if !self.store.delete_function(id)? {
            return Err(CatalogError::not_found("Function", id));
        }
        Ok(())
    }

    /// Check a stored function is complete and its implementation prepares
    pub fn validate_function(&self, id: u64) -> CatalogResult<FunctionValidation> {
        let function = self.get_function(id)?;

        if function.name.trim().is_empty() {
            return Err(CatalogError::Invalid("Function name is required".into()));
        }
        if function.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(CatalogError::Invalid(
                "Function description is required".into(),
            ));
        }
        if function.input_schemas.is_empty() {
            return Err(CatalogError::Invalid(
                "Function needs at least one input schema".into(),
            ));
        }
        if function.output_schemas.is_empty() {
            return Err(CatalogError::Invalid(
                "Function needs at least one output schema".into(),
            ));
        }

        Implementation::prepare(&function)?;

        Ok(FunctionValidation {
            valid: true,
            function_id: function.id,
            implementation_kind: function.implementation_kind,
        })
    }

    fn check_function(&self, function: &FunctionDef) -> CatalogResult<()> {
        if function.name.trim().is_empty() {
            return Err(CatalogError::Invalid("Function name is required".into()));
        }

        let slots = function
            .input_schemas
            .iter()
            .map(|slot| ("Input", slot))
            .chain(function.output_schemas.iter().map(|slot| ("Output", slot)));
        for (direction, (slot, schema_id)) in slots {
            if !slot_name_pattern().is_match(slot) {
                return Err(CatalogError::Invalid(format!(
                    "{} slot '{}' must be an identifier",
                    direction, slot
                )));
            }
            if self.store.get_schema(*schema_id)?.is_none() {
                return Err(CatalogError::NotFound(format!(
                    "{} object schema with id {} not found",
                    direction, schema_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::functions::ImplementationKind;
    use crate::schema::ObjectSchema;
    use crate::store::MemStore;

    const ECHO: &str = "fn process(x) { return {y: x}; }";

    fn catalog_with_schema() -> (Catalog, u64) {
        let catalog = Catalog::new(Arc::new(MemStore::new()));
        let schema = catalog
            .create_schema(ObjectSchema::with_fields("s", &[("value", "int")]))
            .unwrap();
        (catalog, schema.id)
    }

    fn echo(schema_id: u64) -> FunctionDef {
        FunctionDef::new("echo", ImplementationKind::Script, ECHO)
            .with_description("copies x to y")
            .with_input("x", schema_id)
            .with_output("y", schema_id)
    }

    #[test]
    fn test_create_and_validate() {
        let (catalog, schema_id) = catalog_with_schema();
        let function = catalog.create_function(echo(schema_id)).unwrap();
        assert_eq!(function.id, 1);

        let validation = catalog.validate_function(function.id).unwrap();
        assert!(validation.valid);
        assert_eq!(validation.implementation_kind, "interpreted-script");
    }

    #[test]
    fn test_unknown_schema_reference() {
        let (catalog, _) = catalog_with_schema();
        let err = catalog.create_function(echo(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_slot_names_are_identifiers() {
        let (catalog, schema_id) = catalog_with_schema();
        let function = echo(schema_id).with_output("bad-slot", schema_id);
        let err = catalog.create_function(function).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(err.to_string().contains("bad-slot"));
    }

    #[test]
    fn test_validate_requires_description_and_slots() {
        let (catalog, schema_id) = catalog_with_schema();
        let mut function = echo(schema_id);
        function.description = None;
        let function = catalog.create_function(function).unwrap();
        let err = catalog.validate_function(function.id).unwrap_err();
        assert_eq!(err.to_string(), "Function description is required");

        let no_outputs = FunctionDef::new("f", ImplementationKind::Script, ECHO)
            .with_description("d")
            .with_input("x", schema_id);
        let no_outputs = catalog.create_function(no_outputs).unwrap();
        let err = catalog.validate_function(no_outputs.id).unwrap_err();
        assert!(err.to_string().contains("output schema"));
    }

    #[test]
    fn test_validate_compiles_implementation() {
        let (catalog, schema_id) = catalog_with_schema();
        let mut function = echo(schema_id);
        function.implementation = "fn process(x) { return".into();
        let function = catalog.create_function(function).unwrap();
        let err = catalog.validate_function(function.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompilationError);

        let mut function = echo(schema_id);
        function.implementation_kind = "python".into();
        let function = catalog.create_function(function).unwrap();
        let err = catalog.validate_function(function.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedImplementation);
    }

    #[test]
    fn test_update_refreshes_hash() {
        let (catalog, schema_id) = catalog_with_schema();
        let function = catalog.create_function(echo(schema_id)).unwrap();

        let mut update = echo(schema_id);
        update.implementation = "fn process(x) { return {}; }".into();
        let updated = catalog.update_function(function.id, update).unwrap();
        assert_eq!(updated.id, function.id);
        assert_ne!(updated.implementation_hash, function.implementation_hash);
        assert_eq!(updated.created_at, function.created_at);
    }

    #[test]
    fn test_delete_missing() {
        let (catalog, _) = catalog_with_schema();
        assert_eq!(
            catalog.delete_function(5).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
