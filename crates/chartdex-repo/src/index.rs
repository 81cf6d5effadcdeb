//! Repository index parsing
//!
//! Helm-compatible `index.yaml` documents are parsed into a [`RepositoryIndex`]
//! whose entries are ordered deterministically: names ascending, and within a
//! name versions descending, so position 0 is always the newest version.

use chartdex_core::{Chart, ChartVersion, Maintainer, Repo, chart_id, parse_lenient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::error::{RepoError, Result};

/// Parsed repository index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// API version marker, required
    #[serde(default)]
    pub api_version: String,

    /// When this index was generated
    #[serde(default)]
    pub generated: Option<DateTime<Utc>>,

    /// Chart versions by chart name, newest first
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<IndexEntry>>,
}

impl RepositoryIndex {
    /// Parse an index from raw bytes
    ///
    /// Fails when the document is malformed or has no `apiVersion`. Empty
    /// versions and charts whose newest version is deprecated are dropped
    /// with a log line rather than failing the whole index.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut index: RepositoryIndex = serde_yaml::from_slice(bytes)?;
        if index.api_version.is_empty() {
            return Err(RepoError::Parse {
                message: "no API version".to_string(),
            });
        }
        index.prune();
        index.sort_entries();
        Ok(index)
    }

    /// Parse an index from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_bytes(yaml.as_bytes())
    }

    fn prune(&mut self) {
        self.entries.retain(|name, versions| {
            versions.retain(|v| {
                if v.version.is_empty() {
                    tracing::info!(name = %name, "skipping chart version without a version");
                    return false;
                }
                true
            });
            if versions.is_empty() {
                tracing::info!(name = %name, "skipping empty chart entry");
                return false;
            }
            true
        });
    }

    /// Sort every chart's versions newest first
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(b, a));
        }
        // Deprecation is decided by the newest version, so this runs after sorting
        self.entries.retain(|name, versions| {
            if versions.first().is_some_and(|v| v.deprecated) {
                tracing::info!(name = %name, "skipping deprecated chart");
                return false;
            }
            true
        });
    }

    /// Get all versions of a chart, newest first
    pub fn get(&self, name: &str) -> Option<&Vec<IndexEntry>> {
        self.entries.get(name)
    }

    /// Get the newest version of a chart
    pub fn get_latest(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.get(name).and_then(|versions| versions.first())
    }

    /// List all chart names in order
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of charts in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Order two entries by semantic version, unparsable versions last
fn compare_versions(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    match (parse_lenient(&a.version), parse_lenient(&b.version)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

/// One chart version in the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub home: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// URLs to download the chart archive
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deprecated: bool,

    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl IndexEntry {
    /// Get the primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Convert to the catalog version record
    pub fn to_chart_version(&self) -> ChartVersion {
        ChartVersion {
            version: self.version.clone(),
            app_version: self.app_version.clone().unwrap_or_default(),
            created: self.created,
            digest: self.digest.clone().unwrap_or_default(),
            urls: self.urls.clone(),
        }
    }
}

/// Build catalog charts from an index
///
/// With `shallow`, each chart only carries its newest version; otherwise the
/// full version history is copied. Charts are returned sorted by ID.
pub fn charts_from_index(index: &RepositoryIndex, repo: &Repo, shallow: bool) -> Vec<Chart> {
    let mut charts: Vec<Chart> = index
        .entries
        .iter()
        .filter_map(|(name, versions)| {
            let newest = versions.first()?;
            let chart_versions = if shallow {
                vec![newest.to_chart_version()]
            } else {
                versions.iter().map(IndexEntry::to_chart_version).collect()
            };

            Some(Chart {
                id: chart_id(&repo.name, name),
                name: name.clone(),
                repo: Some(repo.clone()),
                description: newest.description.clone().unwrap_or_default(),
                home: newest.home.clone().unwrap_or_default(),
                keywords: newest.keywords.clone(),
                maintainers: newest.maintainers.clone(),
                sources: newest.sources.clone(),
                icon: newest.icon.clone().unwrap_or_default(),
                category: newest
                    .annotations
                    .get("category")
                    .cloned()
                    .unwrap_or_default(),
                chart_versions,
                ..Default::default()
            })
        })
        .collect();

    charts.sort_by(|a, b| a.id.cmp(&b.id));
    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartdex_core::unescape_or_default;

    const SAMPLE: &str = r#"
apiVersion: v1
generated: "2024-01-01T00:00:00Z"
entries:
  wordpress:
    - name: wordpress
      version: "14.0.0"
      appVersion: "6.3.0"
      urls:
        - wordpress-14.0.0.tgz
    - name: wordpress
      version: "15.1.0"
      appVersion: "6.4.1"
      description: Web publishing platform
      icon: https://example.com/wordpress.svg
      keywords: [cms, blog]
      maintainers:
        - name: Bitnami
          email: containers@bitnami.com
      annotations:
        category: CMS
      digest: "sha256:abc"
      urls:
        - wordpress-15.1.0.tgz
    - name: wordpress
      version: "15.0.0"
      appVersion: "6.4.0"
      urls:
        - wordpress-15.0.0.tgz
  old-chart:
    - name: old-chart
      version: "2.0.0"
      deprecated: true
    - name: old-chart
      version: "1.0.0"
  foo/bar:
    - name: foo/bar
      version: "0.1.0"
  broken:
    - name: broken
      version: ""
"#;

    #[test]
    fn test_parse_sorts_newest_first() {
        let index = RepositoryIndex::from_yaml(SAMPLE).unwrap();
        let versions: Vec<_> = index
            .get("wordpress")
            .unwrap()
            .iter()
            .map(|e| e.version.as_str())
            .collect();
        assert_eq!(versions, vec!["15.1.0", "15.0.0", "14.0.0"]);
        assert_eq!(index.get_latest("wordpress").unwrap().version, "15.1.0");
    }

    #[test]
    fn test_parse_skips_deprecated_and_empty() {
        let index = RepositoryIndex::from_yaml(SAMPLE).unwrap();
        assert!(index.get("old-chart").is_none());
        assert!(index.get("broken").is_none());
        assert_eq!(index.names(), vec!["foo/bar", "wordpress"]);
    }

    #[test]
    fn test_parse_requires_api_version() {
        let err = RepositoryIndex::from_yaml("entries: {}\n").unwrap_err();
        assert!(matches!(err, RepoError::Parse { .. }));

        let err = RepositoryIndex::from_yaml("apiVersion: [not, a, string").unwrap_err();
        assert!(matches!(err, RepoError::Parse { .. }));
    }

    #[test]
    fn test_unparsable_versions_sort_last() {
        let yaml = r#"
apiVersion: v1
entries:
  tool:
    - version: nightly
    - version: "1.0.0"
    - version: "v2"
"#;
        let index = RepositoryIndex::from_yaml(yaml).unwrap();
        let versions: Vec<_> = index.get("tool").unwrap().iter().map(|e| e.version.as_str()).collect();
        assert_eq!(versions, vec!["v2", "1.0.0", "nightly"]);
    }

    fn repo() -> Repo {
        Repo {
            namespace: "kubeapps".to_string(),
            name: "bitnami".to_string(),
            url: "https://charts.bitnami.com/bitnami".to_string(),
            repo_type: "helm".to_string(),
        }
    }

    #[test]
    fn test_charts_from_index_full() {
        let index = RepositoryIndex::from_yaml(SAMPLE).unwrap();
        let charts = charts_from_index(&index, &repo(), false);

        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].id, "bitnami/foo%2Fbar");
        assert_eq!(charts[1].id, "bitnami/wordpress");

        let wordpress = &charts[1];
        assert_eq!(wordpress.chart_versions.len(), 3);
        assert_eq!(wordpress.chart_versions[0].version, "15.1.0");
        assert_eq!(wordpress.chart_versions[0].app_version, "6.4.1");
        assert_eq!(wordpress.category, "CMS");
        assert_eq!(wordpress.description, "Web publishing platform");
        assert_eq!(wordpress.maintainers[0].name, "Bitnami");
        assert_eq!(wordpress.repo.as_ref().unwrap().namespace, "kubeapps");
    }

    #[test]
    fn test_charts_from_index_shallow() {
        let index = RepositoryIndex::from_yaml(SAMPLE).unwrap();
        let charts = charts_from_index(&index, &repo(), true);
        assert!(charts.iter().all(|c| c.chart_versions.len() == 1));
        assert_eq!(charts[1].chart_versions[0].version, "15.1.0");
    }

    #[test]
    fn test_chart_ids_round_trip() {
        let index = RepositoryIndex::from_yaml(SAMPLE).unwrap();
        for chart in charts_from_index(&index, &repo(), true) {
            let suffix = chart.id.strip_prefix("bitnami/").unwrap();
            assert_eq!(unescape_or_default(suffix), chart.name);
        }
    }

    #[test]
    fn test_sort_entries_tolerates_empty_version_lists() {
        let mut index = RepositoryIndex {
            api_version: "v1".to_string(),
            ..Default::default()
        };
        index.entries.insert("empty".to_string(), Vec::new());
        index.sort_entries();
        assert_eq!(index.get("empty").map(Vec::len), Some(0));
        assert!(index.get_latest("empty").is_none());
    }
}
