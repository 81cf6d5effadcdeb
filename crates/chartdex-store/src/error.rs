//! Error types for the catalog store

use thiserror::Error;

/// Catalog store errors
#[derive(Debug, Error)]
pub enum StoreError {
    // ============ Lookup Errors ============
    #[error("Chart '{id}' not found in namespace '{namespace}'")]
    NotFound { namespace: String, id: String },

    #[error("Chart version not found: '{id}' has no version '{version}'")]
    VersionNotFound { id: String, version: String },

    // ============ Query Errors ============
    #[error("Invalid {field}: '{value}'")]
    Validation { field: String, value: String },

    // ============ Storage Errors ============
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type for catalog store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for the lookup misses callers usually map to "not found" responses
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::VersionNotFound { .. }
        )
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(e: serde_yaml::Error) -> Self {
        StoreError::InvalidConfig {
            message: e.to_string(),
        }
    }
}
