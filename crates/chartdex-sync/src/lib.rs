//! chartdex Sync - Keeps the catalog in line with chart repositories
//!
//! - **Repository sync**: load an index, skip unchanged checksums, import charts
//! - **Enrichment**: icons first, then readme/values/schema per version, on a
//!   bounded worker pool where failed jobs never abort the batch
//! - **Namespace filtering**: concurrent access checks and phase filtering
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartdex_core::Repo;
//! use chartdex_repo::ChartRepository;
//! use chartdex_store::CatalogStore;
//! use chartdex_sync::{FileImporter, HttpAssetSource, RepoSyncer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = "https://charts.bitnami.com/bitnami";
//! let repo = Repo {
//!     namespace: "kubeapps".to_string(),
//!     name: "bitnami".to_string(),
//!     url: url.to_string(),
//!     repo_type: "helm".to_string(),
//! };
//! let repository = Arc::new(ChartRepository::new(url, None, Default::default())?);
//! let store = Arc::new(CatalogStore::open_memory("kubeapps")?);
//! let source = Arc::new(HttpAssetSource::new(repository.clone()));
//! let importer = FileImporter::new(store.clone(), source);
//!
//! let outcome = RepoSyncer::new(repo, repository, store, importer).sync(false).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod importer;
pub mod namespaces;
pub mod syncer;

// Re-exports for convenience
pub use error::{Result, SyncError};
pub use importer::{AssetSource, DEFAULT_WORKERS, FileImporter, HttpAssetSource, Icon, ImportReport};
pub use namespaces::{
    Namespace, NamespaceAccessChecker, NamespacePhase, filter_active_namespaces,
    filter_allowed_namespaces,
};
pub use syncer::{RepoSyncer, SyncOutcome};
