//! Error kinds shared across subsystems
//!
//! Every subsystem keeps its own error type; each of them maps onto one
//! `ErrorKind` so callers (HTTP, CLI, the run harness) classify failures
//! the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced schema, table, function or test case is missing
    NotFound,
    /// Row field not declared in the bound schema
    SchemaMismatch,
    /// Unknown `implementation_kind`
    UnsupportedImplementation,
    /// Implementation produced a slot the function does not declare
    UnexpectedOutput,
    /// A declared output slot was not produced
    MissingOutput,
    /// The implementation raised during execution
    InvocationFailure,
    /// Implementation source failed to compile
    CompilationError,
    /// Slot bindings do not line up with the function declaration
    InvalidBinding,
    /// A write references an entity of the wrong shape
    InvalidReference,
    /// Request is malformed or incomplete
    Invalid,
    /// Write collides with existing state
    Conflict,
    /// Invocation exceeded its wall-clock budget
    Timeout,
    /// Invocation exceeded its step, fuel or memory budget
    ResourceExhausted,
    /// Storage or lock failure
    Internal,
}

impl ErrorKind {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "TABULA_NOT_FOUND",
            Self::SchemaMismatch => "TABULA_SCHEMA_MISMATCH",
            Self::UnsupportedImplementation => "TABULA_UNSUPPORTED_IMPLEMENTATION",
            Self::UnexpectedOutput => "TABULA_UNEXPECTED_OUTPUT",
            Self::MissingOutput => "TABULA_MISSING_OUTPUT",
            Self::InvocationFailure => "TABULA_INVOCATION_FAILURE",
            Self::CompilationError => "TABULA_COMPILATION_ERROR",
            Self::InvalidBinding => "TABULA_INVALID_BINDING",
            Self::InvalidReference => "TABULA_INVALID_REFERENCE",
            Self::Invalid => "TABULA_INVALID",
            Self::Conflict => "TABULA_CONFLICT",
            Self::Timeout => "TABULA_TIMEOUT",
            Self::ResourceExhausted => "TABULA_RESOURCE_EXHAUSTED",
            Self::Internal => "TABULA_INTERNAL",
        }
    }

    /// HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::SchemaMismatch => 400,
            Self::UnsupportedImplementation => 400,
            Self::UnexpectedOutput => 422,
            Self::MissingOutput => 422,
            Self::InvocationFailure => 422,
            Self::CompilationError => 400,
            Self::InvalidBinding => 400,
            Self::InvalidReference => 400,
            Self::Invalid => 400,
            Self::Conflict => 409,
            Self::Timeout => 504,
            Self::ResourceExhausted => 422,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::SchemaMismatch.status_code(), 400);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Timeout.status_code(), 504);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_codes_are_prefixed() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::MissingOutput,
            ErrorKind::UnsupportedImplementation,
        ] {
            assert!(kind.code().starts_with("TABULA_"));
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SchemaMismatch).unwrap();
        assert_eq!(json, "\"schema_mismatch\"");
    }
}
