//! chartdex Core - Core types for the chart catalog
//!
//! This crate provides the foundational types shared by the repository
//! engine, the persistent catalog store and the sync workers:
//! - `Chart` / `ChartVersion`: the durable catalog model
//! - `ChartFiles`: readme, values and schema extracted for one chart version
//! - Chart identifiers: `"{repo}/{escaped name}"` composition and parsing
//! - Version summaries: bounded display lists of a chart's version history

pub mod chart;
pub mod error;
pub mod id;
pub mod summary;
pub mod version;

pub use chart::{Chart, ChartCategory, ChartFiles, ChartVersion, Maintainer, Repo};
pub use error::{CoreError, Result};
pub use id::{chart_id, escape_chart_name, unescape_chart_id, unescape_or_default};
pub use summary::{PackageAppVersion, VersionsInSummary, summarize};
pub use version::parse_lenient;
