//! Chart archive file extraction
//!
//! Reads the documentation files of a chart out of its `.tgz` archive. Only
//! files at the chart's top level are considered and names are matched
//! case-insensitively, so `Chart/readme.md` is found as the readme.

use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tar::{Archive, EntryType};

use crate::error::{RepoError, Result};

/// Top-level files extracted from a chart archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveFiles {
    /// `Chart.yaml`
    pub metadata: Option<String>,
    /// `README.md`
    pub readme: Option<String>,
    /// `values.yaml`
    pub values: Option<String>,
    /// `values.schema.json`
    pub schema: Option<String>,
}

/// Extract the chart's metadata, readme, values and schema from `.tgz` bytes
pub fn extract_chart_files(bytes: &[u8]) -> Result<ArchiveFiles> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = Archive::new(decoder);
    let mut files = ArchiveFiles::default();

    for entry in archive.entries().map_err(archive_error)? {
        let mut entry = entry.map_err(archive_error)?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }

        let path = entry.path().map_err(archive_error)?.into_owned();
        // `<chart>/<file>` at most: nested files belong to subcharts or templates
        if path.components().count() > 2 {
            continue;
        }

        let Some(name) = file_name(&path) else {
            continue;
        };
        let Some(slot) = slot_for(&mut files, &name) else {
            continue;
        };

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| RepoError::Archive {
                message: format!("failed to read '{}': {}", path.display(), e),
            })?;
        *slot = Some(content);
    }

    Ok(files)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

fn slot_for<'a>(files: &'a mut ArchiveFiles, name: &str) -> Option<&'a mut Option<String>> {
    match name {
        "chart.yaml" => Some(&mut files.metadata),
        "readme.md" => Some(&mut files.readme),
        "values.yaml" => Some(&mut files.values),
        "values.schema.json" => Some(&mut files.schema),
        _ => None,
    }
}

fn archive_error(e: std::io::Error) -> RepoError {
    RepoError::Archive {
        message: e.to_string(),
    }
}
