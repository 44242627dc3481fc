//! Table validator
//!
//! Validation semantics:
//! - Every field present in a row must be declared by the schema
//! - Missing fields are accepted
//! - Value types are not checked
//! - The first violation aborts the whole batch
//!
//! The validator never mutates rows.

use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use super::types::{ObjectSchema, Row};

/// Stateless field-presence validator
#[derive(Debug, Default, Clone, Copy)]
pub struct TableValidator;

impl TableValidator {
    /// Creates a validator
    pub fn new() -> Self {
        Self
    }

    /// Validates every row against `schema`.
    ///
    /// # Errors
    ///
    /// Returns a `TABULA_SCHEMA_MISMATCH` error naming the first field that
    /// `schema.attributes` does not declare. No row is accepted on failure.
    pub fn validate(&self, rows: &[Row], schema: &ObjectSchema) -> SchemaResult<()> {
        for (index, row) in rows.iter().enumerate() {
            if let Some(field) = row.keys().find(|field| !schema.declares(field)) {
                return Err(SchemaError::mismatch(
                    &schema.name,
                    ValidationDetails::undeclared_field(index, field.as_str()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::rows_from_value;
    use serde_json::json;

    fn numbers() -> ObjectSchema {
        ObjectSchema::with_fields("numbers", &[("value", "int"), ("label", "string")])
    }

    #[test]
    fn test_declared_fields_pass() {
        let rows = rows_from_value(&json!([{"value": 3}, {"value": 4, "label": "x"}])).unwrap();
        assert!(TableValidator::new().validate(&rows, &numbers()).is_ok());
    }

    #[test]
    fn test_missing_fields_pass() {
        let rows = rows_from_value(&json!([{}, {"label": "only"}])).unwrap();
        assert!(TableValidator::new().validate(&rows, &numbers()).is_ok());
    }

    #[test]
    fn test_extra_field_rejected() {
        let rows = rows_from_value(&json!([{"value": 3, "extra": 1}])).unwrap();
        let err = TableValidator::new().validate(&rows, &numbers()).unwrap_err();
        assert_eq!(err.details().unwrap().field, "extra");
        assert!(err.message().contains("extra"));
    }

    #[test]
    fn test_first_violation_reported() {
        let rows = rows_from_value(&json!([
            {"value": 1},
            {"first": 1},
            {"second": 2}
        ]))
        .unwrap();
        let err = TableValidator::new().validate(&rows, &numbers()).unwrap_err();
        let details = err.details().unwrap();
        assert_eq!(details.row, 1);
        assert_eq!(details.field, "first");
    }

    #[test]
    fn test_value_types_not_checked() {
        let rows = rows_from_value(&json!([{"value": "not an int"}, {"value": null}])).unwrap();
        assert!(TableValidator::new().validate(&rows, &numbers()).is_ok());
    }

    #[test]
    fn test_empty_rows_pass() {
        assert!(TableValidator::new().validate(&[], &numbers()).is_ok());
    }
}
