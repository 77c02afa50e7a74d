//! Storage-local error type.
//!
//! `ember-storage` never hands an `EmberError` back to its callers directly
//! — `StorageError` carries enough detail for logging, and callers (rule
//! store, user store) decide how to fold it into `EmberError::BackendError`
//! at their own boundary. This mirrors the teacher's split between
//! `neomind_core::storage::StorageError` (backend-local) and the
//! crate-edge error each consumer exposes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for StorageError {
    fn from(e: toml::de::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for StorageError {
    fn from(e: toml::ser::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<StorageError> for ember_types::EmberError {
    fn from(e: StorageError) -> Self {
        ember_types::EmberError::BackendError(e.to_string())
    }
}
