//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Resolution Errors ============
    #[error("No chart index loaded")]
    NoIndex,

    #[error("No chart named '{name}' in the index")]
    NoChart { name: String },

    #[error("No versions available for chart '{name}'")]
    NoVersions { name: String },

    #[error("No '{name}' chart with version matching '{constraint}' found")]
    NoMatch { name: String, constraint: String },

    // ============ Index Errors ============
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Index '{path}' is {size} bytes, exceeding the {limit} bytes limit")]
    IndexTooLarge { path: String, size: u64, limit: u64 },

    // ============ Network Errors ============
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to download chart '{name}': {message}")]
    Download { name: String, message: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Cache Errors ============
    #[error("Cache key cannot be empty when a cache is configured")]
    CacheKey,

    #[error("Cache is full, cannot store '{key}'")]
    CacheFull { key: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Wrap a transport failure with the resource that was being fetched
    pub fn fetch(url: impl Into<String>, e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        RepoError::Fetch {
            url: url.into(),
            message,
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Parse {
            message: e.to_string(),
        }
    }
}

impl From<semver::Error> for RepoError {
    fn from(e: semver::Error) -> Self {
        RepoError::Parse {
            message: format!("Invalid semver: {}", e),
        }
    }
}
