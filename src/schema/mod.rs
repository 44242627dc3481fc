//! Schema subsystem for tabula
//!
//! Schemas declare the field names rows may carry; tables are validated
//! against their schema on every write, including tables materialized from
//! function outputs.
//!
//! # Design Principles
//!
//! - Field-presence validation only, no value-type checks
//! - Undeclared fields abort the write
//! - All-or-nothing per call
//! - Deterministic validation

mod errors;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, ValidationDetails};
pub use types::{rows_from_value, ObjectSchema, Row, Rows, Table};
pub use validator::TableValidator;
