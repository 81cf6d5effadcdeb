//! Version summaries
//!
//! A chart can publish hundreds of versions. For display, the history is
//! reduced to a bounded list: at most `major` major lines, `minor` minor lines
//! per major, and `patch` patches per minor, newest first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chart::ChartVersion;
use crate::version::parse_lenient;

/// Default number of major versions in a summary
pub const MAJOR_VERSIONS_IN_SUMMARY: usize = 3;
/// Default number of minor versions per major in a summary
pub const MINOR_VERSIONS_IN_SUMMARY: usize = 3;
/// Default number of patch versions per minor in a summary
pub const PATCH_VERSIONS_IN_SUMMARY: usize = 3;

/// Caps applied at each version granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsInSummary {
    pub major: usize,
    pub minor: usize,
    pub patch: usize,
}

impl Default for VersionsInSummary {
    fn default() -> Self {
        Self {
            major: MAJOR_VERSIONS_IN_SUMMARY,
            minor: MINOR_VERSIONS_IN_SUMMARY,
            patch: PATCH_VERSIONS_IN_SUMMARY,
        }
    }
}

/// Package version paired with the packaged application's version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageAppVersion {
    pub pkg_version: String,
    pub app_version: String,
}

/// Reduce a version history to a bounded, newest-first summary
///
/// Unparsable versions are dropped. A version is kept when it opens a new
/// major line while fewer than `caps.major` are open, opens a new minor line in
/// an open major while fewer than `caps.minor` are open there, or adds a patch
/// to an open minor line holding fewer than `caps.patch` entries. The first
/// version of a major line is always admitted into that line, even with a zero
/// minor or patch cap.
pub fn summarize(versions: &[ChartVersion], caps: VersionsInSummary) -> Vec<PackageAppVersion> {
    let mut parsed: Vec<_> = versions
        .iter()
        .filter_map(|cv| parse_lenient(&cv.version).map(|v| (v, cv)))
        .collect();
    parsed.sort_by(|(a, _), (b, _)| b.cmp(a));

    // major -> minor -> number of patches included
    let mut lines: HashMap<u64, HashMap<u64, usize>> = HashMap::new();
    let mut summary = Vec::new();

    for (version, cv) in parsed {
        match lines.get(&version.major) {
            None => {
                if lines.len() >= caps.major {
                    continue;
                }
            }
            Some(minors) => match minors.get(&version.minor) {
                None => {
                    if minors.len() >= caps.minor {
                        continue;
                    }
                }
                Some(&patches) => {
                    if patches >= caps.patch {
                        continue;
                    }
                }
            },
        }

        summary.push(PackageAppVersion {
            pkg_version: cv.version.clone(),
            app_version: cv.app_version.clone(),
        });
        *lines
            .entry(version.major)
            .or_default()
            .entry(version.minor)
            .or_default() += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(vs: &[&str]) -> Vec<ChartVersion> {
        vs.iter()
            .map(|v| ChartVersion {
                version: v.to_string(),
                app_version: format!("app-{}", v),
                ..Default::default()
            })
            .collect()
    }

    fn pkg_versions(summary: &[PackageAppVersion]) -> Vec<&str> {
        summary.iter().map(|s| s.pkg_version.as_str()).collect()
    }

    #[test]
    fn test_patch_cap() {
        let summary = summarize(
            &versions(&["8.5.6", "8.5.5", "8.5.4", "8.5.3"]),
            VersionsInSummary::default(),
        );
        assert_eq!(pkg_versions(&summary), vec!["8.5.6", "8.5.5", "8.5.4"]);
        assert_eq!(summary[0].app_version, "app-8.5.6");
    }

    #[test]
    fn test_minor_and_major_caps() {
        let input = versions(&[
            "4.0.0", "3.2.1", "3.2.0", "3.1.0", "3.0.0", "2.0.0", "1.0.0",
        ]);
        let caps = VersionsInSummary {
            major: 2,
            minor: 2,
            patch: 1,
        };
        let summary = summarize(&input, caps);
        assert_eq!(pkg_versions(&summary), vec!["4.0.0", "3.2.1", "3.1.0"]);
    }

    #[test]
    fn test_unsorted_input_and_garbage() {
        let input = versions(&["1.0.0", "not-a-version", "2.0.0", "1.1.0", "latest"]);
        let summary = summarize(&input, VersionsInSummary::default());
        assert_eq!(pkg_versions(&summary), vec!["2.0.0", "1.1.0", "1.0.0"]);
    }

    #[test]
    fn test_zero_finer_cap_still_admits_first_of_major() {
        let input = versions(&["2.1.0", "2.0.0", "1.0.0"]);
        let caps = VersionsInSummary {
            major: 1,
            minor: 0,
            patch: 0,
        };
        assert_eq!(pkg_versions(&summarize(&input, caps)), vec!["2.1.0"]);
    }

    #[test]
    fn test_zero_major_cap_admits_nothing() {
        let caps = VersionsInSummary {
            major: 0,
            minor: 3,
            patch: 3,
        };
        assert!(summarize(&versions(&["1.0.0"]), caps).is_empty());
    }

    #[test]
    fn test_bounded_descending_subsequence() {
        let mut raw = Vec::new();
        for major in 0..5 {
            for minor in 0..5 {
                for patch in 0..5 {
                    raw.push(format!("{}.{}.{}", major, minor, patch));
                }
            }
        }
        let input: Vec<&str> = raw.iter().map(String::as_str).collect();
        let input = versions(&input);

        for (m, n, p) in [(1, 1, 1), (2, 3, 1), (3, 3, 3), (5, 5, 5), (4, 2, 3)] {
            let caps = VersionsInSummary {
                major: m,
                minor: n,
                patch: p,
            };
            let summary = summarize(&input, caps);
            assert!(summary.len() <= m * n * p);

            let parsed: Vec<_> = summary
                .iter()
                .map(|s| parse_lenient(&s.pkg_version).unwrap())
                .collect();
            assert!(parsed.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
