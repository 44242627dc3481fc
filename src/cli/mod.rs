//! CLI module for tabula
//!
//! Provides command-line interface for:
//! - init: Create the data directory and an empty store
//! - serve: Serve the HTTP API with background run workers
//! - run: One-shot synchronous test case run
//! - validate: One-shot row validation from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    init, run, run_command, run_once, run_test_case, serve, validate, validate_rows, Config,
    StoreKind,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_response};
