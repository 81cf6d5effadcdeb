//! Repository configuration
//!
//! Stored in `~/.config/chartdex/repositories.yaml`:
//!
//! ```yaml
//! userAgent: chartdex/0.2.0
//! timeout: 30s
//! cache:
//!   ttl: 15m
//!   maxItems: 100
//! repositories:
//!   - name: bitnami
//!     namespace: kubeapps
//!     url: https://charts.bitnami.com/bitnami
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RepoError, Result};
use crate::http::{HttpClientOptions, default_user_agent};
use crate::repository::ChartRepository;
use crate::tier::{IndexCache, MetricsRecorder};

/// Repository configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Configured repositories
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,

    /// Shared index cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            cache: CacheSettings::default(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

/// Shared index cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Lifetime of cached indexes; zero never expires
    #[serde(default, with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum number of cached indexes
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_max_items() -> usize {
    100
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            max_items: default_max_items(),
        }
    }
}

/// One configured repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryEntry {
    pub name: String,

    /// Namespace the repository belongs to
    pub namespace: String,

    pub url: String,

    /// Full `Authorization` header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_header: Option<String>,

    /// Send the authorization header to other origins too
    #[serde(default)]
    pub pass_credentials: bool,
}

impl RepositoryEntry {
    /// Key of this repository's index in the shared cache
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl RepositoryConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("chartdex").join("repositories.yaml"))
    }

    /// Reject duplicate repositories within a namespace
    pub fn validate(&self) -> Result<()> {
        for (i, repo) in self.repositories.iter().enumerate() {
            if repo.name.is_empty() || repo.url.is_empty() {
                return Err(RepoError::InvalidConfig {
                    message: format!("repository #{} needs a name and a url", i + 1),
                });
            }
            let duplicate = self.repositories[..i]
                .iter()
                .any(|r| r.name == repo.name && r.namespace == repo.namespace);
            if duplicate {
                return Err(RepoError::InvalidConfig {
                    message: format!(
                        "repository '{}' is defined twice in namespace '{}'",
                        repo.name, repo.namespace
                    ),
                });
            }
        }
        Ok(())
    }

    /// Get a repository by namespace and name
    pub fn get(&self, namespace: &str, name: &str) -> Option<&RepositoryEntry> {
        self.repositories
            .iter()
            .find(|r| r.namespace == namespace && r.name == name)
    }

    /// HTTP options for one repository
    pub fn http_options(&self, entry: &RepositoryEntry) -> HttpClientOptions {
        HttpClientOptions {
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            authorization: entry.authorization_header.clone(),
            pass_credentials: entry.pass_credentials,
        }
    }

    /// Create the shared index cache described by `cache`
    pub fn index_cache(&self) -> Arc<IndexCache> {
        Arc::new(IndexCache::new(self.cache.max_items))
    }

    /// Build a repository, attached to `cache` when one is given
    pub fn open(
        &self,
        entry: &RepositoryEntry,
        cache: Option<Arc<IndexCache>>,
        recorder: Option<MetricsRecorder>,
    ) -> Result<ChartRepository> {
        let repo = ChartRepository::new(&entry.url, None, self.http_options(entry))?;
        match cache {
            Some(cache) => repo.with_memory_cache(entry.cache_key(), cache, self.cache.ttl, recorder),
            None => Ok(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
userAgent: chartdex-sync/1.0
timeout: 10s
cache:
  ttl: 15m
  maxItems: 4
repositories:
  - name: bitnami
    namespace: kubeapps
    url: https://charts.bitnami.com/bitnami
  - name: private
    namespace: team-a
    url: https://charts.internal.example.com
    authorizationHeader: Bearer abc
    passCredentials: true
"#;

    #[test]
    fn test_parse() {
        let config: RepositoryConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.cache.ttl, Duration::from_secs(900));
        assert_eq!(config.cache.max_items, 4);

        let private = config.get("team-a", "private").unwrap();
        assert_eq!(private.cache_key(), "team-a/private");

        let options = config.http_options(private);
        assert_eq!(options.user_agent, "chartdex-sync/1.0");
        assert_eq!(options.authorization.as_deref(), Some("Bearer abc"));
        assert!(options.pass_credentials);
    }

    #[test]
    fn test_defaults() {
        let config: RepositoryConfig = serde_yaml::from_str("repositories: []\n").unwrap();
        assert_eq!(config, RepositoryConfig::default());
        assert!(config.user_agent.starts_with("chartdex/"));
        assert_eq!(config.cache.ttl, Duration::ZERO);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut config = RepositoryConfig::default();
        let entry = RepositoryEntry {
            name: "bitnami".to_string(),
            namespace: "kubeapps".to_string(),
            url: "https://charts.bitnami.com/bitnami".to_string(),
            ..Default::default()
        };
        config.repositories.push(entry.clone());
        config.repositories.push(entry);
        assert!(matches!(config.validate(), Err(RepoError::InvalidConfig { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("repositories.yaml");

        let config: RepositoryConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.save_to(&path).unwrap();
        assert_eq!(RepositoryConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_open_with_cache() {
        let config: RepositoryConfig = serde_yaml::from_str(CONFIG).unwrap();
        let entry = config.get("kubeapps", "bitnami").unwrap();

        let repo = config.open(entry, Some(config.index_cache()), None).unwrap();
        assert_eq!(repo.url(), "https://charts.bitnami.com/bitnami");
        assert!(!repo.has_index());
    }
}
