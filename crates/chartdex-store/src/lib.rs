//! chartdex Catalog Store
//!
//! Durable, query-filtered views of chart metadata:
//!
//! - **Lookups**: charts, chart versions and chart files by ID, with a
//!   pattern fallback for mirrored `repo/name` IDs
//! - **Listings**: namespace, name, version, repository, category and
//!   free-text filters with pagination
//! - **Categories**: per-category chart counts under the same filters
//! - **Writer API**: used by the sync process to import charts, icons and files
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartdex_store::{CatalogStore, ChartQuery, StoreConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CatalogStore::open(&StoreConfig::default())?;
//!
//! let query = ChartQuery {
//!     search_query: "wordpress".to_string(),
//!     ..ChartQuery::namespace("default")
//! };
//! let first_page = store.get_paginated_chart_list_with_filters(&query, 0, 20)?;
//! # let _ = first_page;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod query;
pub mod store;

// Re-exports for convenience
pub use config::{DEFAULT_GLOBAL_PACKAGING_NAMESPACE, StoreConfig};
pub use error::{Result, StoreError};
pub use query::{
    ALL_NAMESPACES, ChartLookup, ChartQuery, WhereClause, generate_where_clause, pagination_clause,
};
pub use store::CatalogStore;
