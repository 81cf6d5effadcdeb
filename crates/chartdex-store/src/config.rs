//! Store configuration
//!
//! ```yaml
//! database: /var/lib/chartdex/catalog.db
//! globalPackagingNamespace: kubeapps
//! versionsInSummary:
//!   major: 3
//!   minor: 3
//!   patch: 3
//! ```

use chartdex_core::VersionsInSummary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Namespace whose repositories are visible from every namespace
pub const DEFAULT_GLOBAL_PACKAGING_NAMESPACE: &str = "kubeapps";

/// Catalog store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// SQLite database file; the default cache location when unset
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default = "default_global_namespace")]
    pub global_packaging_namespace: String,

    #[serde(default)]
    pub versions_in_summary: VersionsInSummary,
}

fn default_global_namespace() -> String {
    DEFAULT_GLOBAL_PACKAGING_NAMESPACE.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: None,
            global_packaging_namespace: default_global_namespace(),
            versions_in_summary: VersionsInSummary::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        if config.global_packaging_namespace.is_empty() {
            return Err(StoreError::InvalidConfig {
                message: "globalPackagingNamespace cannot be empty".to_string(),
            });
        }
        Ok(config)
    }

    /// Database path, falling back to `~/.cache/chartdex/catalog.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Self::default_database_path(),
        }
    }

    pub fn default_database_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| StoreError::InvalidConfig {
            message: "Could not determine cache directory".to_string(),
        })?;
        Ok(cache_dir.join("chartdex").join("catalog.db"))
    }
}
