//! Catalog model types
//!
//! These are the records persisted in the catalog store as JSON documents.
//! Field names on the wire are kept stable because the store's filter
//! predicates address them directly (`chartVersions`, `app_version`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Repository that owns a chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// Namespace the repository is registered in
    pub namespace: String,

    /// Repository name
    pub name: String,

    /// Repository base URL
    #[serde(default)]
    pub url: String,

    /// Repository type (`helm`, `oci`)
    #[serde(default, rename = "type")]
    pub repo_type: String,
}

/// Chart maintainer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One published version of a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartVersion {
    /// Chart version
    pub version: String,

    /// Version of the packaged application
    #[serde(default)]
    pub app_version: String,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Archive digest
    #[serde(default)]
    pub digest: String,

    /// Archive download URLs
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Durable catalog record for a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Composite ID: `{repoName}/{escapedName}`
    #[serde(rename = "ID")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub repo: Option<Repo>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub home: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    #[serde(default)]
    pub sources: Vec<String>,

    /// Icon URL as published in the index
    #[serde(default)]
    pub icon: String,

    /// Imported icon bytes, stored base64 encoded
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub raw_icon: Vec<u8>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_content_type: String,

    #[serde(default)]
    pub category: String,

    /// Versions, newest first
    #[serde(default, rename = "chartVersions")]
    pub chart_versions: Vec<ChartVersion>,
}

impl Chart {
    /// Parse a chart from its stored JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the stored JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Newest version, if any
    pub fn latest_version(&self) -> Option<&ChartVersion> {
        self.chart_versions.first()
    }

    /// Find a version by its exact version string
    pub fn find_version(&self, version: &str) -> Option<&ChartVersion> {
        self.chart_versions.iter().find(|v| v.version == version)
    }

    /// Check the fields every catalog consumer relies on
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(missing("name"));
        }
        if self.id.is_empty() {
            return Err(missing("ID"));
        }
        if self.repo.is_none() {
            return Err(missing("repo"));
        }
        if self.chart_versions.is_empty() {
            return Err(missing("chartVersions[0]"));
        }
        if self.chart_versions.iter().any(|v| v.version.is_empty()) {
            return Err(missing("chartVersions[i].version"));
        }
        if self.maintainers.iter().any(|m| m.name.is_empty()) {
            return Err(missing("maintainers[i].name"));
        }
        Ok(())
    }
}

fn missing(field: &str) -> CoreError {
    CoreError::MissingField {
        field: field.to_string(),
    }
}

/// Files extracted from one chart version's archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartFiles {
    /// `{chartID}-{version}`
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(default)]
    pub readme: String,

    #[serde(default)]
    pub values: String,

    #[serde(default)]
    pub schema: String,

    #[serde(default)]
    pub repo: Option<Repo>,

    /// Digest of the archive the files were extracted from
    #[serde(default)]
    pub digest: String,
}

impl ChartFiles {
    /// Build the files ID for a chart version
    pub fn files_id(chart_id: &str, version: &str) -> String {
        format!("{}-{}", chart_id, version)
    }
}

/// Category with the number of charts in it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartCategory {
    pub name: String,
    pub count: u64,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
