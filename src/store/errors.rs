//! Store error types

use thiserror::Error;

use crate::error::ErrorKind;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    Missing { kind: &'static str, id: u64 },

    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),

    #[error("Store file corrupted: {0}")]
    Corrupted(String),

    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn missing(kind: &'static str, id: u64) -> Self {
        StoreError::Missing { kind, id }
    }

    pub fn poisoned() -> Self {
        StoreError::Internal("Lock poisoned".into())
    }

    /// Crate-wide classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Missing { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
