//! Index load tiers
//!
//! [`ChartRepository::strategically_load`] walks an ordered chain of tiers and
//! installs the first snapshot one of them produces. The default chain is
//! shared memory cache (when attached), then the disk cache file, then the
//! remote repository.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RepoError, Result};
use crate::index::RepositoryIndex;
use crate::memory::{CacheEvent, MemoryCache};
use crate::repository::ChartRepository;

/// Immutable parsed index together with the checksum of its source bytes
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub index: RepositoryIndex,
    /// Hex SHA-256 of the bytes the index was parsed from
    pub checksum: String,
}

impl IndexSnapshot {
    /// Parse index bytes and checksum them
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let index = RepositoryIndex::from_bytes(bytes)?;
        Ok(Self {
            index,
            checksum: sha256_hex(bytes),
        })
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Callback receiving shared cache hit/miss events
pub type MetricsRecorder = Arc<dyn Fn(CacheEvent) + Send + Sync>;

/// Shared cache of parsed indexes, keyed by a tenant-safe key
pub type IndexCache = MemoryCache<Arc<IndexSnapshot>>;

/// One source of index snapshots in the load chain
#[async_trait]
pub trait IndexTier: Send + Sync {
    /// Tier name for logging
    fn name(&self) -> &'static str;

    /// Produce a snapshot, or `None` to fall through to the next tier
    async fn try_get(&self, repo: &ChartRepository) -> Result<Option<Arc<IndexSnapshot>>>;

    /// Keep a snapshot for later loads. Tiers that cannot store ignore it.
    async fn store(&self, _repo: &ChartRepository, _snapshot: &Arc<IndexSnapshot>) -> Result<()> {
        Ok(())
    }
}

/// Shared in-memory cache tier
pub struct MemoryTier {
    key: String,
    cache: Arc<IndexCache>,
    ttl: Duration,
    recorder: Option<MetricsRecorder>,
}

impl MemoryTier {
    /// Attach a shared cache under `key`; the key must not be empty
    pub fn new(
        key: impl Into<String>,
        cache: Arc<IndexCache>,
        ttl: Duration,
        recorder: Option<MetricsRecorder>,
    ) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(RepoError::CacheKey);
        }
        Ok(Self {
            key,
            cache,
            ttl,
            recorder,
        })
    }

    fn record(&self, event: CacheEvent) {
        tracing::debug!(key = %self.key, event = event.as_str(), "index cache lookup");
        if let Some(recorder) = &self.recorder {
            recorder(event);
        }
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IndexTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn try_get(&self, _repo: &ChartRepository) -> Result<Option<Arc<IndexSnapshot>>> {
        match self.cache.get(&self.key) {
            Some(snapshot) => {
                self.record(CacheEvent::Hit);
                Ok(Some(snapshot))
            }
            None => {
                self.record(CacheEvent::Miss);
                Ok(None)
            }
        }
    }

    async fn store(&self, _repo: &ChartRepository, snapshot: &Arc<IndexSnapshot>) -> Result<()> {
        self.cache.set(&self.key, Arc::clone(snapshot), self.ttl)
    }
}

/// Disk cache file tier, used when the repository has a cache path
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskTier;

#[async_trait]
impl IndexTier for DiskTier {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn try_get(&self, repo: &ChartRepository) -> Result<Option<Arc<IndexSnapshot>>> {
        let Some(path) = repo.cache_path() else {
            return Ok(None);
        };
        let snapshot = repo.read_snapshot(&path).await?;
        Ok(Some(Arc::new(snapshot)))
    }
}

/// Remote tier: downloads `index.yaml` into a new cache file and loads it
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteTier;

#[async_trait]
impl IndexTier for RemoteTier {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn try_get(&self, repo: &ChartRepository) -> Result<Option<Arc<IndexSnapshot>>> {
        let path = repo.cache_index().await?;
        let snapshot = repo.read_snapshot(&path).await?;
        Ok(Some(Arc::new(snapshot)))
    }
}

/// Tiers used when none are configured explicitly
pub fn default_tiers() -> Vec<Box<dyn IndexTier>> {
    vec![Box::new(DiskTier), Box::new(RemoteTier)]
}
