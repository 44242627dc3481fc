//! Harness error types

use thiserror::Error;

use crate::error::ErrorKind;
use crate::store::StoreError;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised while scheduling or recording runs.
///
/// Failures of the run itself are not errors here; they are recorded on
/// the test case as `last_status = error`.
#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("Test case {0} not found")]
    NotFound(u64),

    #[error("Run queue is closed")]
    QueueClosed,

    #[error("Run worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HarnessError {
    /// Crate-wide classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::NotFound(_) => ErrorKind::NotFound,
            HarnessError::QueueClosed | HarnessError::Worker(_) => ErrorKind::Internal,
            HarnessError::Store(e) => e.kind(),
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}
