//! Repository sync
//!
//! One pass of [`RepoSyncer::sync`] brings the catalog in line with a
//! repository's index: the index is loaded, compared against the checksum of
//! the last completed sync, and on change every chart is imported and
//! enriched with icons and files before the new checksum is recorded.

use chartdex_core::Repo;
use chartdex_repo::{ChartRepository, RepoError, charts_from_index};
use chartdex_store::CatalogStore;
use chrono::Utc;
use std::sync::Arc;

use crate::error::Result;
use crate::importer::{AssetSource, FileImporter, ImportReport};

/// What a sync pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The index matched the last recorded checksum
    Unchanged { checksum: String },
    /// Charts were imported from an index with a new checksum
    Synced {
        checksum: String,
        charts: usize,
        report: ImportReport,
    },
}

/// Syncs one repository into the catalog store
pub struct RepoSyncer<S> {
    repo: Repo,
    repository: Arc<ChartRepository>,
    store: Arc<CatalogStore>,
    importer: FileImporter<S>,
}

impl<S: AssetSource> RepoSyncer<S> {
    pub fn new(
        repo: Repo,
        repository: Arc<ChartRepository>,
        store: Arc<CatalogStore>,
        importer: FileImporter<S>,
    ) -> Self {
        Self {
            repo,
            repository,
            store,
            importer,
        }
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    /// Run one sync pass; `force` ignores the recorded checksum
    ///
    /// The loaded index and its cache file are released whether or not the
    /// pass succeeds.
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome> {
        let outcome = self.sync_loaded(force).await;
        let released = self.release_index();
        let outcome = outcome?;
        released?;
        Ok(outcome)
    }

    async fn sync_loaded(&self, force: bool) -> Result<SyncOutcome> {
        self.repository.strategically_load().await?;
        let snapshot = self.repository.index().ok_or(RepoError::NoIndex)?;
        let checksum = snapshot.checksum.clone();

        if !force && self.store.repo_already_processed(&self.repo, &checksum)? {
            tracing::info!(
                namespace = %self.repo.namespace,
                repo = %self.repo.name,
                checksum = %checksum,
                "index unchanged, skipping"
            );
            return Ok(SyncOutcome::Unchanged { checksum });
        }

        let charts = charts_from_index(&snapshot.index, &self.repo, false);
        self.store.import_charts(&self.repo, &charts)?;
        tracing::info!(
            namespace = %self.repo.namespace,
            repo = %self.repo.name,
            charts = charts.len(),
            "charts imported"
        );

        let report = self.importer.fetch_files(&self.repo, &charts).await;
        self.store
            .update_last_check(&self.repo.namespace, &self.repo.name, &checksum, Utc::now())?;

        Ok(SyncOutcome::Synced {
            checksum,
            charts: charts.len(),
            report,
        })
    }

    /// Remove the repository and everything imported from it
    pub fn delete(&self) -> Result<()> {
        self.store.delete_repo(&self.repo)?;
        tracing::info!(namespace = %self.repo.namespace, repo = %self.repo.name, "repository deleted");
        Ok(())
    }

    /// Drop the resident index so the next pass fetches a fresh one
    fn release_index(&self) -> Result<()> {
        self.repository.unload();
        self.repository.remove_cache()?;
        Ok(())
    }
}
