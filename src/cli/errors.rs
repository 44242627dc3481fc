//! CLI-specific error types

use std::fmt;
use std::io;

use crate::catalog::CatalogError;
use crate::error::ErrorKind;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// Boot failed
    BootFailed,
    /// A catalog or run operation failed
    Operation(ErrorKind),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "TABULA_CLI_CONFIG_ERROR",
            Self::IoError => "TABULA_CLI_IO_ERROR",
            Self::AlreadyInitialized => "TABULA_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "TABULA_CLI_NOT_INITIALIZED",
            Self::BootFailed => "TABULA_CLI_BOOT_FAILED",
            Self::Operation(kind) => kind.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Already initialized
    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already initialized",
        )
    }

    /// Not initialized
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'tabula init' first.",
        )
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Failed catalog or run operation
    pub fn operation(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Operation(kind), msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Crate-wide classification
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            CliErrorCode::ConfigError | CliErrorCode::NotInitialized => ErrorKind::Invalid,
            CliErrorCode::AlreadyInitialized => ErrorKind::Conflict,
            CliErrorCode::IoError | CliErrorCode::BootFailed => ErrorKind::Internal,
            CliErrorCode::Operation(kind) => kind,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::operation(e.kind(), e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::operation(e.kind(), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
