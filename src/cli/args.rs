//! CLI argument definitions using clap
//!
//! Commands:
//! - tabula init --config <path>
//! - tabula serve --config <path>
//! - tabula run --config <path> --test-case <id>
//! - tabula validate --config <path> --schema <id>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tabula - schema-checked table transformations and their test cases
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./tabula.json")]
        config: PathBuf,
    },

    /// Serve the HTTP API and run queued test cases
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./tabula.json")]
        config: PathBuf,
    },

    /// Run one test case synchronously and print the updated record
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./tabula.json")]
        config: PathBuf,

        /// Test case id
        #[arg(long)]
        test_case: u64,
    },

    /// Validate rows read from stdin against a schema
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./tabula.json")]
        config: PathBuf,

        /// Schema id
        #[arg(long)]
        schema: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
