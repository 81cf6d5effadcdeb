//! Icon and chart file enrichment
//!
//! After a repository's charts are imported, [`FileImporter`] attaches the
//! extras that are not part of the index: each chart's icon, and the readme,
//! values and schema of every version. Work runs on a bounded pool in two
//! phases. Every icon is imported before any files job starts, and the newest
//! version of every chart is processed before older versions, so the most
//! visible data lands first.

use async_trait::async_trait;
use chartdex_core::{Chart, ChartFiles, ChartVersion, Repo};
use chartdex_repo::{ArchiveFiles, ChartRepository, IndexEntry, extract_chart_files};
use chartdex_store::CatalogStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::error::Result;

/// Default number of concurrent import jobs
pub const DEFAULT_WORKERS: usize = 10;

/// Icon bytes with the content type they were served as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Where chart icons and archives come from
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the chart's icon, `None` when the chart declares no icon
    async fn fetch_icon(&self, chart: &Chart) -> Result<Option<Icon>>;

    /// Fetch the documentation files of one chart version
    async fn fetch_files(&self, chart: &Chart, version: &ChartVersion) -> Result<ArchiveFiles>;
}

/// Assets fetched over HTTP with the repository's client and credentials
#[derive(Debug, Clone)]
pub struct HttpAssetSource {
    repository: Arc<ChartRepository>,
}

impl HttpAssetSource {
    pub fn new(repository: Arc<ChartRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch_icon(&self, chart: &Chart) -> Result<Option<Icon>> {
        if chart.icon.is_empty() {
            return Ok(None);
        }
        let (data, content_type) = self
            .repository
            .client()
            .get_with_content_type(&chart.icon)
            .await?;
        Ok(Some(Icon { data, content_type }))
    }

    async fn fetch_files(&self, chart: &Chart, version: &ChartVersion) -> Result<ArchiveFiles> {
        let entry = IndexEntry {
            name: chart.name.clone(),
            version: version.version.clone(),
            urls: version.urls.clone(),
            digest: Some(version.digest.clone()),
            ..Default::default()
        };
        let archive = self.repository.download_chart(&entry).await?;
        Ok(extract_chart_files(&archive)?)
    }
}

/// Counts of what one import batch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub icons_imported: usize,
    pub icons_missing: usize,
    pub icons_failed: usize,
    pub files_imported: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Imported,
    Skipped,
    Failed,
}

/// Imports icons and chart files into the catalog store
pub struct FileImporter<S> {
    store: Arc<CatalogStore>,
    source: Arc<S>,
    workers: usize,
}

impl<S: AssetSource> FileImporter<S> {
    pub fn new(store: Arc<CatalogStore>, source: Arc<S>) -> Self {
        Self {
            store,
            source,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Set the pool size, at least one
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Import icons, then files, for `charts` of `repo`
    ///
    /// Failed jobs are logged and counted; they never abort the batch.
    pub async fn fetch_files(&self, repo: &Repo, charts: &[Chart]) -> ImportReport {
        let mut report = ImportReport::default();
        tracing::debug!(workers = self.workers, charts = charts.len(), "starting import workers");

        let icon_outcomes: Vec<Outcome> = stream::iter(charts)
            .map(|chart| self.run_icon_job(repo, chart))
            .buffer_unordered(self.workers)
            .collect()
            .await;
        for outcome in icon_outcomes {
            match outcome {
                Outcome::Imported => report.icons_imported += 1,
                Outcome::Skipped => report.icons_missing += 1,
                Outcome::Failed => report.icons_failed += 1,
            }
        }

        let file_outcomes: Vec<Outcome> = stream::iter(files_jobs(charts))
            .map(|(chart, version)| self.run_files_job(repo, chart, version))
            .buffer_unordered(self.workers)
            .collect()
            .await;
        for outcome in file_outcomes {
            match outcome {
                Outcome::Imported => report.files_imported += 1,
                Outcome::Skipped => report.files_skipped += 1,
                Outcome::Failed => report.files_failed += 1,
            }
        }

        report
    }

    async fn run_icon_job(&self, repo: &Repo, chart: &Chart) -> Outcome {
        tracing::debug!(name = %chart.name, "importing icon");
        match self.import_icon(repo, chart).await {
            Ok(true) => Outcome::Imported,
            Ok(false) => Outcome::Skipped,
            Err(e) => {
                tracing::error!(name = %chart.name, error = %e, "failed to import icon");
                Outcome::Failed
            }
        }
    }

    async fn import_icon(&self, repo: &Repo, chart: &Chart) -> Result<bool> {
        let Some(icon) = self.source.fetch_icon(chart).await? else {
            tracing::info!(name = %chart.name, "icon not found");
            return Ok(false);
        };
        self.store
            .update_icon(repo, &icon.data, &icon.content_type, &chart.id)?;
        Ok(true)
    }

    async fn run_files_job(&self, repo: &Repo, chart: &Chart, version: &ChartVersion) -> Outcome {
        tracing::debug!(name = %chart.name, version = %version.version, "importing readme and values");
        match self.import_files(repo, chart, version).await {
            Ok(true) => Outcome::Imported,
            Ok(false) => Outcome::Skipped,
            Err(e) => {
                tracing::error!(
                    name = %chart.name,
                    version = %version.version,
                    error = %e,
                    "failed to import files"
                );
                Outcome::Failed
            }
        }
    }

    async fn import_files(&self, repo: &Repo, chart: &Chart, version: &ChartVersion) -> Result<bool> {
        let files_id = ChartFiles::files_id(&chart.id, &version.version);
        if self.store.files_exist(repo, &files_id, &version.digest)? {
            tracing::debug!(name = %chart.name, version = %version.version, "skipping existing files");
            return Ok(false);
        }

        tracing::debug!(name = %chart.name, version = %version.version, "fetching files");
        let extracted = self.source.fetch_files(chart, version).await?;

        let files = ChartFiles {
            id: files_id,
            readme: found_or_logged(extracted.readme, chart, version, "README.md"),
            values: found_or_logged(extracted.values, chart, version, "values.yaml"),
            schema: found_or_logged(extracted.schema, chart, version, "values.schema.json"),
            repo: Some(repo.clone()),
            digest: version.digest.clone(),
        };
        self.store.insert_files(&chart.id, &files)?;
        Ok(true)
    }
}

/// Files jobs: every chart's newest version, then all older versions
fn files_jobs(charts: &[Chart]) -> Vec<(&Chart, &ChartVersion)> {
    let mut newest = Vec::with_capacity(charts.len());
    let mut older = Vec::new();
    for chart in charts {
        let mut versions = chart.chart_versions.iter();
        let Some(latest) = versions.next() else {
            tracing::info!(name = %chart.name, "chart has no versions");
            continue;
        };
        newest.push((chart, latest));
        older.extend(versions.map(|v| (chart, v)));
    }
    newest.extend(older);
    newest
}

fn found_or_logged(content: Option<String>, chart: &Chart, version: &ChartVersion, file: &str) -> String {
    content.unwrap_or_else(|| {
        tracing::info!(name = %chart.name, version = %version.version, file, "file not found");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use chartdex_repo::{HttpClientOptions, RepoError};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bitnami() -> Repo {
        Repo {
            namespace: "default".to_string(),
            name: "bitnami".to_string(),
            url: "https://charts.bitnami.com/bitnami".to_string(),
            repo_type: "helm".to_string(),
        }
    }

    fn chart(name: &str, versions: &[&str]) -> Chart {
        Chart {
            id: format!("bitnami/{}", name),
            name: name.to_string(),
            repo: Some(bitnami()),
            icon: format!("https://icons.example.com/{}.png", name),
            chart_versions: versions
                .iter()
                .map(|v| ChartVersion {
                    version: v.to_string(),
                    digest: format!("sha256:{}-{}", name, v),
                    urls: vec![format!("{}-{}.tgz", name, v)],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Records the order jobs reach the source, failing on request
    #[derive(Default)]
    struct RecordingSource {
        events: Mutex<Vec<String>>,
        fail_icons: Vec<String>,
        fail_files: Vec<String>,
    }

    fn server_error(asset: &str) -> SyncError {
        RepoError::Fetch {
            url: format!("http://charts.example.com/{}", asset),
            message: "unexpected status 500".to_string(),
        }
        .into()
    }

    impl RecordingSource {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AssetSource for RecordingSource {
        async fn fetch_icon(&self, chart: &Chart) -> Result<Option<Icon>> {
            self.events.lock().unwrap().push(format!("icon:{}", chart.name));
            tokio::task::yield_now().await;
            if self.fail_icons.contains(&chart.name) {
                return Err(server_error(&chart.name));
            }
            Ok(Some(Icon {
                data: b"\x89PNG".to_vec(),
                content_type: "image/png".to_string(),
            }))
        }

        async fn fetch_files(&self, chart: &Chart, version: &ChartVersion) -> Result<ArchiveFiles> {
            let job = format!("{}-{}", chart.name, version.version);
            self.events.lock().unwrap().push(format!("files:{}", job));
            tokio::task::yield_now().await;
            if self.fail_files.contains(&job) {
                return Err(server_error(&job));
            }
            Ok(ArchiveFiles {
                readme: Some(format!("# {}", chart.name)),
                values: Some("replicaCount: 1\n".to_string()),
                ..Default::default()
            })
        }
    }

    fn seeded_store(charts: &[Chart]) -> Arc<CatalogStore> {
        let store = CatalogStore::open_memory("kubeapps").unwrap();
        store.import_charts(&bitnami(), charts).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_icons_imported_before_any_files() {
        let charts = vec![
            chart("apache", &["2.0.0", "1.0.0"]),
            chart("nginx", &["3.0.0"]),
            chart("redis", &["5.0.0", "4.0.0"]),
        ];
        let store = seeded_store(&charts);
        let source = Arc::new(RecordingSource::default());
        let importer = FileImporter::new(store.clone(), source.clone()).with_workers(4);

        let report = importer.fetch_files(&bitnami(), &charts).await;
        assert_eq!(report.icons_imported, 3);
        assert_eq!(report.files_imported, 5);

        let events = source.events();
        let last_icon = events.iter().rposition(|e| e.starts_with("icon:")).unwrap();
        let first_files = events.iter().position(|e| e.starts_with("files:")).unwrap();
        assert!(last_icon < first_files, "events: {:?}", events);

        let stored = store.get_chart("default", "bitnami/nginx").unwrap();
        assert_eq!(stored.raw_icon, b"\x89PNG");
        assert_eq!(stored.icon_content_type, "image/png");
    }

    #[tokio::test]
    async fn test_newest_versions_first() {
        let charts = vec![
            chart("apache", &["2.0.0", "1.0.0"]),
            chart("redis", &["5.0.0", "4.0.0", "3.0.0"]),
        ];
        let store = seeded_store(&charts);
        let source = Arc::new(RecordingSource::default());
        let importer = FileImporter::new(store, source.clone()).with_workers(1);

        importer.fetch_files(&bitnami(), &charts).await;

        let files: Vec<String> = source
            .events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("files:").map(str::to_string))
            .collect();
        assert_eq!(
            files,
            vec![
                "apache-2.0.0",
                "redis-5.0.0",
                "apache-1.0.0",
                "redis-4.0.0",
                "redis-3.0.0",
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let charts = vec![chart("apache", &["2.0.0", "1.0.0"]), chart("nginx", &["3.0.0"])];
        let store = seeded_store(&charts);
        let source = Arc::new(RecordingSource {
            fail_icons: vec!["apache".to_string()],
            fail_files: vec!["apache-2.0.0".to_string()],
            ..Default::default()
        });
        let importer = FileImporter::new(store.clone(), source).with_workers(2);

        let report = importer.fetch_files(&bitnami(), &charts).await;
        assert_eq!(
            report,
            ImportReport {
                icons_imported: 1,
                icons_failed: 1,
                files_imported: 2,
                files_failed: 1,
                ..Default::default()
            }
        );

        let files = store
            .get_chart_files("default", "bitnami/apache-1.0.0")
            .unwrap();
        assert_eq!(files.readme, "# apache");
        assert_eq!(files.schema, "");
        assert_eq!(files.digest, "sha256:apache-1.0.0");
        assert!(store.get_chart_files("default", "bitnami/apache-2.0.0").is_err());
    }

    #[tokio::test]
    async fn test_existing_files_with_same_digest_are_skipped() {
        let charts = vec![chart("apache", &["2.0.0", "1.0.0"])];
        let store = seeded_store(&charts);
        store
            .insert_files(
                "bitnami/apache",
                &ChartFiles {
                    id: "bitnami/apache-2.0.0".to_string(),
                    readme: "cached".to_string(),
                    repo: Some(bitnami()),
                    digest: "sha256:apache-2.0.0".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let source = Arc::new(RecordingSource::default());
        let importer = FileImporter::new(store.clone(), source.clone()).with_workers(1);

        let report = importer.fetch_files(&bitnami(), &charts).await;
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_imported, 1);
        assert!(!source.events().contains(&"files:apache-2.0.0".to_string()));

        let files = store
            .get_chart_files("default", "bitnami/apache-2.0.0")
            .unwrap();
        assert_eq!(files.readme, "cached");
    }

    #[tokio::test]
    async fn test_charts_without_icon_or_versions() {
        let mut bare = chart("bare", &[]);
        bare.icon = String::new();
        let charts = vec![bare];
        let store = Arc::new(CatalogStore::open_memory("kubeapps").unwrap());
        let repository =
            ChartRepository::new("https://charts.example.com", None, HttpClientOptions::default())
                .unwrap();
        let source = Arc::new(HttpAssetSource::new(Arc::new(repository)));
        let importer = FileImporter::new(store, source);

        let report = importer.fetch_files(&bitnami(), &charts).await;
        assert_eq!(
            report,
            ImportReport {
                icons_missing: 1,
                ..Default::default()
            }
        );
    }

    fn build_tgz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn test_http_asset_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/icons/apache.svg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/svg+xml")
                    .set_body_bytes(b"<svg/>".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/apache-2.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(build_tgz(&[
                ("apache/Chart.yaml", "name: apache\n"),
                ("apache/README.md", "# Apache\n"),
                ("apache/values.yaml", "replicaCount: 1\n"),
                ("apache/charts/sub/README.md", "# Sub\n"),
            ])))
            .mount(&server)
            .await;

        let repo_url = format!("{}/charts", server.uri());
        let repository = ChartRepository::new(&repo_url, None, HttpClientOptions::default()).unwrap();
        let source = HttpAssetSource::new(Arc::new(repository));

        let mut apache = chart("apache", &["2.0.0"]);
        apache.icon = format!("{}/icons/apache.svg", server.uri());

        let icon = source.fetch_icon(&apache).await.unwrap().unwrap();
        assert_eq!(icon.data, b"<svg/>");
        assert_eq!(icon.content_type, "image/svg+xml");

        let files = source
            .fetch_files(&apache, &apache.chart_versions[0])
            .await
            .unwrap();
        assert_eq!(files.readme.as_deref(), Some("# Apache\n"));
        assert_eq!(files.values.as_deref(), Some("replicaCount: 1\n"));
        assert_eq!(files.schema, None);
    }

    #[tokio::test]
    async fn test_http_asset_source_missing_archive() {
        let server = MockServer::start().await;
        let repository = ChartRepository::new(&server.uri(), None, HttpClientOptions::default()).unwrap();
        let source = HttpAssetSource::new(Arc::new(repository));
        let apache = chart("apache", &["2.0.0"]);

        let err = source
            .fetch_files(&apache, &apache.chart_versions[0])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Repo(_)));
    }
}
