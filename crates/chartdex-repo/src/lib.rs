//! chartdex Repository Access
//!
//! This crate loads and queries Helm-compatible chart repositories:
//!
//! - **Index parsing**: `index.yaml` into a deterministically ordered index
//! - **Tiered loading**: shared memory cache, disk cache file, then remote
//! - **Version resolution**: exact matches, latest stable and semver ranges
//! - **Downloads**: relative archive URLs resolved against the repository
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartdex_repo::ChartRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = ChartRepository::new("https://charts.bitnami.com/bitnami", None, Default::default())?;
//! repo.strategically_load().await?;
//!
//! let version = repo.get("wordpress", "^15")?;
//! let archive = repo.download_chart(&version).await?;
//! # let _ = archive;
//! # repo.remove_cache()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are only sent to the repository's origin unless
//!   `pass_credentials` is set, including across redirects
//! - Shared cache keys must be tenant-safe

pub mod archive;
pub mod config;
pub mod constraint;
pub mod error;
pub mod http;
pub mod index;
pub mod memory;
pub mod repository;
pub mod tier;

// Re-exports for convenience
pub use archive::{ArchiveFiles, extract_chart_files};
pub use config::{CacheSettings, RepositoryConfig, RepositoryEntry};
pub use constraint::Constraint;
pub use error::{RepoError, Result};
pub use http::{HttpClient, HttpClientOptions, same_origin};
pub use index::{IndexEntry, RepositoryIndex, charts_from_index};
pub use memory::{CacheEvent, MemoryCache};
pub use repository::{ChartRepository, MAX_INDEX_SIZE};
pub use tier::{
    DiskTier, IndexCache, IndexSnapshot, IndexTier, MemoryTier, MetricsRecorder, RemoteTier,
    default_tiers,
};
