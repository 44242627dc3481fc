//! tabula - schema-checked table transformations and their test cases
//!
//! Object schemas declare the fields rows may carry, tables hold validated
//! rows, functions transform input tables into output tables, and test
//! cases compare a function's outputs with expected tables.

pub mod catalog;
pub mod cli;
pub mod error;
pub mod functions;
pub mod harness;
pub mod http_server;
pub mod observability;
pub mod schema;
pub mod store;

pub use error::ErrorKind;
