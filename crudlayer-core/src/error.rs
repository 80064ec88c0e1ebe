//! Error types and result types for collection compilation and request handling.
//!
//! Errors fall into two families. Definition errors are raised while compiling a
//! collection definition and must abort startup. Request errors are raised while
//! resolving a caller's projection or query and are surfaced back to that caller.
//! Cast anomalies are never errors: the caster leaves such values untouched.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors produced by the crudlayer core and its backends.
#[derive(Error, Debug)]
pub enum CrudError {
    /// The collection definition is malformed or ambiguous. Fatal at startup.
    #[error("Invalid collection definition: {0}")]
    Definition(String),
    /// The caller's request is ambiguous or asks for something it may not have.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// No compiled collection is registered under the given name.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl CrudError {
    /// Returns `true` when the error was caused by the caller's request and
    /// should be reported back to it rather than treated as a server fault.
    pub fn is_request_error(&self) -> bool {
        matches!(self, CrudError::InvalidRequest(_))
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        CrudError::InvalidRequest(reason.into())
    }

    pub(crate) fn definition(reason: impl Into<String>) -> Self {
        CrudError::Definition(reason.into())
    }
}

/// A specialized `Result` type for crudlayer operations.
pub type CrudResult<T> = Result<T, CrudError>;

impl From<BsonError> for CrudError {
    fn from(err: BsonError) -> Self {
        CrudError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for CrudError {
    fn from(err: SerdeJsonError) -> Self {
        CrudError::Serialization(err.to_string())
    }
}
