//! Error types for sync operations

use thiserror::Error;

/// Sync operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Repository error: {0}")]
    Repo(#[from] chartdex_repo::RepoError),

    #[error("Store error: {0}")]
    Store(#[from] chartdex_store::StoreError),

    #[error("Access check failed for namespace '{namespace}': {message}")]
    NamespaceCheck { namespace: String, message: String },
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
