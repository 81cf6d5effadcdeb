//! Chart repository access
//!
//! A [`ChartRepository`] owns the index of one remote repository. The parsed
//! index lives in an immutable [`IndexSnapshot`] that is swapped wholesale, so
//! readers see either the previous index or the new one, never a mix.
//!
//! Network and disk I/O always happen outside the state lock. Loads are
//! serialized by a separate async gate so concurrent callers on a fresh
//! repository fetch the remote index at most once.

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chartdex_core::parse_lenient;
use semver::Version;

use crate::constraint::Constraint;
use crate::error::{RepoError, Result};
use crate::http::{HttpClient, HttpClientOptions, parse_url};
use crate::index::IndexEntry;
use crate::tier::{IndexCache, IndexSnapshot, IndexTier, MemoryTier, MetricsRecorder, default_tiers};

/// Largest index accepted from disk or the network (50 MiB)
pub const MAX_INDEX_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Default)]
struct RepoState {
    snapshot: Option<Arc<IndexSnapshot>>,
    cache_path: Option<PathBuf>,
    /// Whether `cache_path` was written by this repository
    cached: bool,
}

/// A remote chart repository and its loaded index
pub struct ChartRepository {
    url: String,
    client: HttpClient,
    state: RwLock<RepoState>,
    load_gate: tokio::sync::Mutex<()>,
    tiers: Vec<Box<dyn IndexTier>>,
}

impl std::fmt::Debug for ChartRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tiers: Vec<_> = self.tiers.iter().map(|t| t.name()).collect();
        f.debug_struct("ChartRepository")
            .field("url", &self.url)
            .field("tiers", &tiers)
            .field("has_index", &self.has_index())
            .finish()
    }
}

impl ChartRepository {
    /// Create a repository for `url`, optionally reading the index from an
    /// existing cache file
    pub fn new(url: &str, cache_path: Option<PathBuf>, options: HttpClientOptions) -> Result<Self> {
        parse_url(url)?;
        let client = HttpClient::new(url, &options)?;
        Ok(Self {
            url: url.to_string(),
            client,
            state: RwLock::new(RepoState {
                cache_path,
                ..Default::default()
            }),
            load_gate: tokio::sync::Mutex::new(()),
            tiers: default_tiers(),
        })
    }

    /// Consult a shared in-memory cache before any other tier
    ///
    /// The key must be safe across tenants: anyone holding it reads the
    /// cached index. An empty key is rejected with `CacheKey`.
    pub fn with_memory_cache(
        mut self,
        key: impl Into<String>,
        cache: Arc<IndexCache>,
        ttl: Duration,
        recorder: Option<MetricsRecorder>,
    ) -> Result<Self> {
        let tier = MemoryTier::new(key, cache, ttl, recorder)?;
        self.tiers.insert(0, Box::new(tier));
        Ok(self)
    }

    /// Replace the load chain
    pub fn with_tiers(mut self, tiers: Vec<Box<dyn IndexTier>>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Repository base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP client carrying this repository's credentials
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RepoState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RepoState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, snapshot: Arc<IndexSnapshot>) {
        self.write_state().snapshot = Some(snapshot);
    }

    /// Load the index from the first tier that has it
    ///
    /// Returns immediately when an index is already resident.
    pub async fn strategically_load(&self) -> Result<()> {
        if self.has_index() {
            return Ok(());
        }

        let _gate = self.load_gate.lock().await;
        // Another caller may have loaded while we waited
        if self.has_index() {
            return Ok(());
        }

        for tier in &self.tiers {
            if let Some(snapshot) = tier.try_get(self).await? {
                tracing::debug!(url = %self.url, tier = tier.name(), "index loaded");
                self.install(snapshot);
                return Ok(());
            }
        }

        Err(RepoError::NoIndex)
    }

    /// Store the resident index into every tier that keeps snapshots
    pub async fn cache_index_in_memory(&self) -> Result<()> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(());
        };
        for tier in &self.tiers {
            tier.store(self, &snapshot).await?;
        }
        Ok(())
    }

    /// Download `index.yaml` into a new temporary cache file
    ///
    /// Sets the cache path and marks it as owned by this repository; the
    /// index itself is not loaded. Returns the file path.
    pub async fn cache_index(&self) -> Result<PathBuf> {
        let index_url = format!("{}/index.yaml", self.url.trim_end_matches('/'));
        tracing::debug!(url = %index_url, "fetching repository index");
        let bytes = self
            .client
            .get_bytes_limited(&index_url, MAX_INDEX_SIZE)
            .await?;

        let path = tokio::task::spawn_blocking(move || write_temp_index(&bytes))
            .await
            .map_err(|e| RepoError::Io(std::io::Error::other(e)))??;

        let mut state = self.write_state();
        state.cache_path = Some(path.clone());
        state.cached = true;
        Ok(path)
    }

    /// Parse index bytes and make them the resident index
    pub fn load_index_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        let snapshot = IndexSnapshot::from_bytes(bytes)?;
        self.install(Arc::new(snapshot));
        Ok(())
    }

    /// Read an index file and make it the resident index
    pub async fn load_from_file(&self, path: &Path) -> Result<()> {
        let snapshot = self.read_snapshot(path).await?;
        self.install(Arc::new(snapshot));
        Ok(())
    }

    /// Read and parse an index file without installing it
    pub(crate) async fn read_snapshot(&self, path: &Path) -> Result<IndexSnapshot> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(RepoError::Io(std::io::Error::other(format!(
                "'{}' is a directory",
                path.display()
            ))));
        }
        if metadata.len() > MAX_INDEX_SIZE {
            return Err(RepoError::IndexTooLarge {
                path: path.display().to_string(),
                size: metadata.len(),
                limit: MAX_INDEX_SIZE,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        IndexSnapshot::from_bytes(&bytes).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "cached index is corrupted");
        })
    }

    /// Resolve a chart version
    ///
    /// An exact version string match wins without any semver parsing. An
    /// empty constraint or `*` selects the latest stable version; otherwise
    /// the highest version satisfying the range is returned, with equal
    /// versions ordered by earlier creation time.
    pub fn get(&self, name: &str, constraint: &str) -> Result<IndexEntry> {
        let snapshot = self.snapshot().ok_or(RepoError::NoIndex)?;
        let versions = snapshot.index.get(name).ok_or_else(|| RepoError::NoChart {
            name: name.to_string(),
        })?;
        if versions.is_empty() {
            return Err(RepoError::NoVersions {
                name: name.to_string(),
            });
        }

        if !constraint.is_empty() {
            if let Some(exact) = versions.iter().find(|v| v.version == constraint) {
                return Ok(exact.clone());
            }
        }

        let matcher = if constraint.is_empty() || constraint == "*" {
            Constraint::latest_stable()
        } else {
            Constraint::parse(constraint)?
        };

        let mut matched: Vec<(Version, &IndexEntry)> = versions
            .iter()
            .filter_map(|entry| parse_lenient(&entry.version).map(|v| (v, entry)))
            .filter(|(v, _)| matcher.matches(v))
            .collect();

        matched.sort_by(|(va, a), (vb, b)| {
            precedence(vb, va).then_with(|| a.created.cmp(&b.created))
        });

        matched
            .into_iter()
            .next()
            .map(|(_, entry)| entry.clone())
            .ok_or_else(|| RepoError::NoMatch {
                name: name.to_string(),
                constraint: constraint.to_string(),
            })
    }

    /// Download the archive of a chart version
    pub async fn download_chart(&self, version: &IndexEntry) -> Result<Vec<u8>> {
        let url = self.resolve_chart_url(version)?;
        tracing::debug!(name = %version.name, version = %version.version, url = %url, "downloading chart");
        self.client.get_bytes(&url).await
    }

    /// Absolute URL of a version's archive
    ///
    /// Relative references are resolved against the repository URL, and the
    /// repository URL's query string is kept.
    pub fn resolve_chart_url(&self, version: &IndexEntry) -> Result<String> {
        let reference = version.download_url().ok_or_else(|| RepoError::Download {
            name: version.name.clone(),
            message: "chart has no downloadable URLs".to_string(),
        })?;

        match url::Url::parse(reference) {
            Ok(absolute) => return Ok(absolute.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {}
            Err(e) => {
                return Err(RepoError::InvalidUrl {
                    url: reference.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        let mut base = parse_url(&self.url)?;
        let query = base.query().map(str::to_string);
        let path = format!("{}/", base.path().trim_end_matches('/'));
        base.set_path(&path);

        let mut resolved = base.join(reference).map_err(|e| RepoError::InvalidUrl {
            url: reference.to_string(),
            reason: e.to_string(),
        })?;
        resolved.set_query(query.as_deref());
        Ok(resolved.to_string())
    }

    /// Drop the resident index
    pub fn unload(&self) {
        self.write_state().snapshot = None;
    }

    /// Delete the cache file if this repository created it
    pub fn remove_cache(&self) -> Result<()> {
        let mut state = self.write_state();
        if !state.cached {
            return Ok(());
        }
        if let Some(path) = &state.cache_path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        state.cache_path = None;
        state.cached = false;
        Ok(())
    }

    pub fn has_index(&self) -> bool {
        self.read_state().snapshot.is_some()
    }

    pub fn has_cache_file(&self) -> bool {
        self.read_state().cache_path.is_some()
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.read_state().cache_path.clone()
    }

    /// Checksum of the resident index's source bytes
    pub fn checksum(&self) -> Option<String> {
        self.read_state()
            .snapshot
            .as_ref()
            .map(|s| s.checksum.clone())
    }

    /// The resident index
    pub fn index(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot()
    }

    fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.read_state().snapshot.clone()
    }
}

/// Semver precedence, ignoring build metadata
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

fn write_temp_index(bytes: &[u8]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("chartdex-index-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| RepoError::Io(e.error))?;
    Ok(path)
}
