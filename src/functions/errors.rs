//! # Function Errors

use thiserror::Error;

use crate::error::ErrorKind;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for function operations
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Function execution errors
#[derive(Debug, Clone, Error)]
pub enum FunctionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unsupported implementation kind: {0}")]
    UnsupportedImplementation(String),

    #[error("Unexpected output slot '{0}'")]
    UnexpectedOutput(String),

    #[error("Missing expected output '{0}'")]
    MissingOutput(String),

    #[error("Invalid input binding: {0}")]
    InvalidBinding(String),

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Invocation failed: {0}")]
    InvocationFailure(String),

    #[error("Function timeout after {0}ms")]
    Timeout(u64),

    #[error("Resource limit exceeded: {0}")]
    ResourceExhausted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FunctionError {
    /// Crate-wide classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            FunctionError::NotFound(_) => ErrorKind::NotFound,
            FunctionError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            FunctionError::UnsupportedImplementation(_) => ErrorKind::UnsupportedImplementation,
            FunctionError::UnexpectedOutput(_) => ErrorKind::UnexpectedOutput,
            FunctionError::MissingOutput(_) => ErrorKind::MissingOutput,
            FunctionError::InvalidBinding(_) => ErrorKind::InvalidBinding,
            FunctionError::CompilationError(_) => ErrorKind::CompilationError,
            FunctionError::InvocationFailure(_) => ErrorKind::InvocationFailure,
            FunctionError::Timeout(_) => ErrorKind::Timeout,
            FunctionError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            FunctionError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<SchemaError> for FunctionError {
    fn from(e: SchemaError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => FunctionError::NotFound(e.message().to_string()),
            _ => FunctionError::SchemaMismatch(e.message().to_string()),
        }
    }
}

impl From<StoreError> for FunctionError {
    fn from(e: StoreError) -> Self {
        FunctionError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationDetails;

    #[test]
    fn test_status_codes() {
        assert_eq!(FunctionError::NotFound("test".into()).status_code(), 404);
        assert_eq!(FunctionError::Timeout(1000).status_code(), 504);
        assert_eq!(
            FunctionError::UnsupportedImplementation("python".into()).status_code(),
            400
        );
    }

    #[test]
    fn test_messages_name_the_slot() {
        assert!(FunctionError::MissingOutput("y".into())
            .to_string()
            .contains("'y'"));
        assert!(FunctionError::UnexpectedOutput("z".into())
            .to_string()
            .contains("'z'"));
    }

    #[test]
    fn test_from_schema_error() {
        let err: FunctionError =
            SchemaError::mismatch("s", ValidationDetails::undeclared_field(0, "extra")).into();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.to_string().contains("extra"));

        let err: FunctionError = SchemaError::unknown_schema(3).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
