//! # HTTP API
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Counter snapshot
//! - `/api/v1/objects` - Object schemas, plus `/:id/validate` for rows
//! - `/api/v1/tables` - Tables
//! - `/api/v1/functions` - Functions, plus `/:id/validate`
//! - `/api/v1/test-cases` - Test cases, plus `/:id/run` (202, queued)
//!
//! Errors are returned as `{error, code, status}`.

pub mod config;
pub mod errors;
pub mod functions_routes;
pub mod objects_routes;
pub mod observability_routes;
pub mod server;
pub mod state;
pub mod tables_routes;
pub mod test_cases_routes;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use server::{HttpServer, API_PREFIX};
pub use state::AppState;
pub use test_cases_routes::RunAccepted;
