//! Schema error types
//!
//! Error codes:
//! - TABULA_UNKNOWN_SCHEMA (REJECT)
//! - TABULA_SCHEMA_MISMATCH (REJECT)

use std::fmt;

use crate::error::ErrorKind;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Schema id not found
    UnknownSchema,
    /// Row carries a field the schema does not declare
    SchemaMismatch,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::UnknownSchema => "TABULA_UNKNOWN_SCHEMA",
            SchemaErrorCode::SchemaMismatch => "TABULA_SCHEMA_MISMATCH",
        }
    }

    /// Returns the crate-wide error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaErrorCode::UnknownSchema => ErrorKind::NotFound,
            SchemaErrorCode::SchemaMismatch => ErrorKind::SchemaMismatch,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Location of the first offending field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Zero-based row index
    pub row: usize,
    /// Undeclared field name
    pub field: String,
}

impl ValidationDetails {
    pub fn undeclared_field(row: usize, field: impl Into<String>) -> Self {
        Self {
            row,
            field: field.into(),
        }
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field {} not in schema attributes (row {})",
            self.field, self.row
        )
    }
}

/// Schema error with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    schema: Option<String>,
    details: Option<ValidationDetails>,
}

impl SchemaError {
    /// Create an unknown schema error
    pub fn unknown_schema(schema_id: u64) -> Self {
        Self {
            code: SchemaErrorCode::UnknownSchema,
            message: format!("Object schema {} not found", schema_id),
            schema: None,
            details: None,
        }
    }

    /// Create a validation failure naming the undeclared field
    pub fn mismatch(schema_name: impl Into<String>, details: ValidationDetails) -> Self {
        let schema = schema_name.into();
        Self {
            code: SchemaErrorCode::SchemaMismatch,
            message: format!("{} for schema '{}'", details, schema),
            schema: Some(schema),
            details: Some(details),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the crate-wide error kind
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the schema name if applicable
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Returns validation details if applicable
    pub fn details(&self) -> Option<&ValidationDetails> {
        self.details.as_ref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
