//! CLI command implementations
//!
//! Every command loads and validates the configuration first; nothing is
//! opened or spawned for an invalid config.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::Catalog;
use crate::error::ErrorKind;
use crate::functions::RuntimeConfig;
use crate::harness::{RunQueue, TestCase, TestHarness};
use crate::http_server::{AppState, HttpServer, HttpServerConfig};
use crate::observability::{
    log_event, log_event_with_fields, Event, Logger, MetricsRegistry, Severity,
};
use crate::schema::rows_from_value;
use crate::store::{FileStore, MemStore, Store, StoreError};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};

/// Where entities are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Checksummed snapshot under `data_dir`
    #[default]
    File,
    /// Process memory only
    Memory,
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Store backend (optional, default "file")
    #[serde(default)]
    pub store: StoreKind,

    /// HTTP bind address and CORS origins
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Run workers (optional, default 2)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-run execution limits
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Log threshold (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_workers() -> usize {
    2
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        if self.workers == 0 {
            return Err(CliError::config_error("workers must be greater than 0"));
        }

        self.runtime.validate().map_err(CliError::config_error)?;
        self.http.bind_addr().map_err(CliError::config_error)?;
        self.severity()?;

        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(CliError::config_error)
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
        Command::Run { config, test_case } => run_test_case(&config, test_case),
        Command::Validate { config, schema } => validate(&config, schema),
    }
}

/// Initialize a new data directory with an empty snapshot
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let data_dir = config.data_path();

    if FileStore::exists(data_dir) {
        return Err(CliError::already_initialized());
    }

    let store = FileStore::open(data_dir)
        .map_err(|e| CliError::boot_failed(format!("Store create failed: {}", e)))?;
    store
        .flush()
        .map_err(|e| CliError::boot_failed(format!("Store create failed: {}", e)))?;

    write_response(json!({
        "initialized": true,
        "path": store.path().display().to_string(),
    }))
}

/// Serve the HTTP API until interrupted
///
/// Startup order: config, store, workers, listener. On Ctrl-C the listener
/// stops accepting, then queued runs drain before exit.
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_threshold(config.severity()?);
    log_event(Event::BootStart);
    let data_dir = config.data_dir.clone();
    log_event_with_fields(Event::ConfigLoaded, &[("data_dir", data_dir.as_str())]);

    let store = open_store(&config)?;
    let metrics = Arc::new(MetricsRegistry::new());
    let harness = Arc::new(TestHarness::new(
        store.clone(),
        config.runtime,
        metrics.clone(),
    ));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async move {
        let (queue, workers) = RunQueue::start(harness, config.workers);
        let state = AppState::new(Catalog::new(store), queue, metrics.clone());
        let server = HttpServer::new(config.http.clone(), state);
        log_event(Event::BootComplete);

        let result = server.start(shutdown_signal()).await;

        log_event(Event::ShutdownStart);
        workers.join().await;
        let totals = metrics.to_json();
        log_event_with_fields(Event::ShutdownComplete, &[("metrics", totals.as_str())]);

        result.map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Run one test case and print the updated record
pub fn run_test_case(config_path: &Path, test_case_id: u64) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_threshold(config.severity()?);
    let test_case = run_once(&config, test_case_id)?;
    write_response(test_case)
}

/// Validate a JSON row array from stdin against a schema
pub fn validate(config_path: &Path, schema_id: u64) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_threshold(config.severity()?);
    let rows = validate_rows(&config, schema_id, io::stdin().lock())?;
    write_response(json!({
        "valid": true,
        "object_id": schema_id,
        "rows": rows,
    }))
}

/// Synchronous run against the configured store
pub fn run_once(config: &Config, test_case_id: u64) -> CliResult<TestCase> {
    let store = open_store(config)?;
    let harness = TestHarness::new(store, config.runtime, Arc::new(MetricsRegistry::new()));
    harness
        .run(test_case_id)
        .map_err(|e| CliError::operation(e.kind(), e.to_string()))?
        .ok_or_else(|| {
            CliError::operation(
                ErrorKind::NotFound,
                format!("Test case {} not found", test_case_id),
            )
        })
}

/// Validate rows read from `input`; returns the row count
pub fn validate_rows(config: &Config, schema_id: u64, input: impl Read) -> CliResult<usize> {
    let body = read_request(input)?;
    let rows = rows_from_value(&body)
        .ok_or_else(|| CliError::io_error("Input must be a JSON array of objects"))?;

    let catalog = Catalog::new(open_store(config)?);
    catalog.validate_table(&rows, schema_id)?;
    Ok(rows.len())
}

fn open_store(config: &Config) -> CliResult<Arc<dyn Store>> {
    match config.store {
        StoreKind::Memory => Ok(Arc::new(MemStore::new())),
        StoreKind::File => {
            let data_dir = config.data_path();
            if !FileStore::exists(data_dir) {
                return Err(CliError::not_initialized());
            }

            let store = FileStore::open(data_dir).map_err(|e| {
                let error = e.to_string();
                if matches!(e, StoreError::Corrupted(_)) {
                    log_event_with_fields(Event::StoreCorrupted, &[("error", error.as_str())]);
                }
                CliError::boot_failed(format!("Store open failed: {}", error))
            })?;

            let path = store.path().display().to_string();
            log_event_with_fields(Event::StoreOpened, &[("path", path.as_str())]);
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
