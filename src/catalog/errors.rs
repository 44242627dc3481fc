//! Catalog error types

use thiserror::Error;

use crate::error::ErrorKind;
use crate::functions::FunctionError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by catalog writes and lookups
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn not_found(kind: &str, id: u64) -> Self {
        CatalogError::NotFound(format!("{} {} not found", kind, id))
    }

    /// Crate-wide classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::Invalid(_) => ErrorKind::Invalid,
            CatalogError::InvalidReference(_) => ErrorKind::InvalidReference,
            CatalogError::Schema(e) => e.kind(),
            CatalogError::Function(e) => e.kind(),
            CatalogError::Store(e) => e.kind(),
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}
