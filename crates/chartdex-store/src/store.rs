//! SQLite catalog store
//!
//! Charts and chart files are stored as JSON documents in the `info` column,
//! keyed by repository namespace, repository name and ID. Reads are served by
//! the query builder in [`crate::query`]; writes come from the sync path.
//!
//! Features:
//! - WAL mode for concurrent readers
//! - Foreign keys cascade repository deletion to charts and files
//! - Two-segment ID fallback for mirrored charts

use chartdex_core::{Chart, ChartCategory, ChartFiles, Repo};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::query::{
    CHART_TABLE, ChartLookup, ChartQuery, FILES_TABLE, REPO_TABLE, categories_sql, chart_list_sql,
    generate_where_clause,
};

/// Persistent catalog of charts and their files
pub struct CatalogStore {
    conn: Mutex<Connection>,
    global_namespace: String,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("global_namespace", &self.global_namespace)
            .finish_non_exhaustive()
    }
}

impl CatalogStore {
    /// Open the store described by a configuration
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.database_path()?;
        Self::open_at(&path, &config.global_packaging_namespace)
    }

    /// Open or create a store at a specific path
    pub fn open_at(path: &Path, global_namespace: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        // journal_mode answers with the resulting mode
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(path = %path.display(), mode = %mode, "WAL mode unavailable");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::with_connection(conn, global_namespace)
    }

    /// Open an in-memory store (for testing)
    pub fn open_memory(global_namespace: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, global_namespace)
    }

    fn with_connection(conn: Connection, global_namespace: &str) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            global_namespace: global_namespace.to_string(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Namespace whose charts are visible from every namespace
    pub fn get_global_packaging_namespace(&self) -> &str {
        &self.global_namespace
    }

    // ============ Reads ============

    /// Get a chart by ID
    pub fn get_chart(&self, namespace: &str, chart_id: &str) -> Result<Chart> {
        let info = self
            .find_info(CHART_TABLE, "chart_id", namespace, chart_id)?
            .ok_or_else(|| not_found(namespace, chart_id))?;
        Ok(serde_json::from_str(&info)?)
    }

    /// Get a chart carrying only the requested version
    pub fn get_chart_version(&self, namespace: &str, chart_id: &str, version: &str) -> Result<Chart> {
        let mut chart = self.get_chart(namespace, chart_id)?;
        let found = chart
            .chart_versions
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(|| StoreError::VersionNotFound {
                id: chart_id.to_string(),
                version: version.to_string(),
            })?;
        let selected = chart.chart_versions.swap_remove(found);
        chart.chart_versions = vec![selected];
        Ok(chart)
    }

    /// Get the files of one chart version by files ID (`{chartID}-{version}`)
    pub fn get_chart_files(&self, namespace: &str, files_id: &str) -> Result<ChartFiles> {
        let info = self
            .find_info(FILES_TABLE, "chart_files_id", namespace, files_id)?
            .ok_or_else(|| not_found(namespace, files_id))?;
        Ok(serde_json::from_str(&info)?)
    }

    /// Exact lookup, then at most one pattern fallback for `repo/name` IDs
    fn find_info(&self, table: &str, column: &str, namespace: &str, id: &str) -> Result<Option<String>> {
        let conn = self.conn();
        if let Some(info) = lookup(&conn, &ChartLookup::Exact, table, column, namespace, id)? {
            return Ok(Some(info));
        }

        let Some(fallback) = ChartLookup::fallback_for(id) else {
            return Ok(None);
        };
        tracing::debug!(namespace, id, "no exact match, trying pattern fallback");
        lookup(&conn, &fallback, table, column, namespace, id)
    }

    /// List charts matching a query, ordered by name
    pub fn get_paginated_chart_list_with_filters(
        &self,
        query: &ChartQuery,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<Chart>> {
        let clause = generate_where_clause(query, &self.global_namespace)?;
        let sql = chart_list_sql(&clause, offset, page_size);

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|info| serde_json::from_str(info).map_err(StoreError::from))
            .collect()
    }

    /// Count charts per category for a query
    pub fn get_all_chart_categories(&self, query: &ChartQuery) -> Result<Vec<ChartCategory>> {
        let clause = generate_where_clause(query, &self.global_namespace)?;
        let sql = categories_sql(&clause);

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let categories = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| {
                Ok(ChartCategory {
                    name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    // ============ Writes ============

    /// Register a repository if needed and return its row ID
    pub fn ensure_repo_exists(&self, namespace: &str, name: &str) -> Result<i64> {
        let conn = self.conn();
        ensure_repo(&conn, namespace, name)
    }

    /// Replace the charts of a repository
    ///
    /// Charts are upserted by ID and charts of the repository missing from
    /// `charts` are removed, in one transaction.
    pub fn import_charts(&self, repo: &Repo, charts: &[Chart]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        ensure_repo(&tx, &repo.namespace, &repo.name)?;

        {
            let mut upsert = tx.prepare(&format!(
                "INSERT INTO {} (repo_namespace, repo_name, chart_id, info) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (repo_name, repo_namespace, chart_id) DO UPDATE SET info = excluded.info",
                CHART_TABLE
            ))?;
            for chart in charts {
                let info = serde_json::to_string(chart)?;
                upsert.execute(params![repo.namespace, repo.name, chart.id, info])?;
            }
        }

        let ids: Vec<&str> = charts.iter().map(|c| c.id.as_str()).collect();
        let removed = tx.execute(
            &format!(
                "DELETE FROM {} WHERE repo_name = $1 AND repo_namespace = $2 \
                 AND chart_id NOT IN (SELECT value FROM json_each($3))",
                CHART_TABLE
            ),
            params![repo.name, repo.namespace, serde_json::to_string(&ids)?],
        )?;
        tx.commit()?;

        tracing::debug!(
            namespace = %repo.namespace,
            repo = %repo.name,
            imported = charts.len(),
            removed,
            "charts imported"
        );
        Ok(())
    }

    /// Attach icon bytes to a chart
    pub fn update_icon(&self, repo: &Repo, data: &[u8], content_type: &str, chart_id: &str) -> Result<()> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);

        let updated = self.conn().execute(
            &format!(
                "UPDATE {} SET info = json_set(info, '$.raw_icon', $1, '$.icon_content_type', $2) \
                 WHERE chart_id = $3 AND repo_namespace = $4 AND repo_name = $5",
                CHART_TABLE
            ),
            params![encoded, content_type, chart_id, repo.namespace, repo.name],
        )?;
        if updated == 0 {
            return Err(not_found(&repo.namespace, chart_id));
        }
        Ok(())
    }

    /// Whether files for this ID were already stored from the same digest
    pub fn files_exist(&self, repo: &Repo, files_id: &str, digest: &str) -> Result<bool> {
        let exists = self.conn().query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE chart_files_id = $1 AND repo_name = $2 \
                 AND repo_namespace = $3 AND info ->> 'digest' = $4)",
                FILES_TABLE
            ),
            params![files_id, repo.name, repo.namespace, digest],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert or replace the files of one chart version
    pub fn insert_files(&self, chart_id: &str, files: &ChartFiles) -> Result<()> {
        let repo = files.repo.as_ref().ok_or_else(|| StoreError::Validation {
            field: "files repo".to_string(),
            value: files.id.clone(),
        })?;
        let info = serde_json::to_string(files)?;

        self.conn().execute(
            &format!(
                "INSERT INTO {} (chart_id, repo_name, repo_namespace, chart_files_id, info) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (repo_namespace, chart_files_id) DO UPDATE SET info = excluded.info",
                FILES_TABLE
            ),
            params![chart_id, repo.name, repo.namespace, files.id, info],
        )?;
        Ok(())
    }

    /// Checksum recorded by the last completed sync
    pub fn last_checksum(&self, repo: &Repo) -> Result<Option<String>> {
        let checksum = self
            .conn()
            .query_row(
                &format!(
                    "SELECT checksum FROM {} WHERE name = $1 AND namespace = $2",
                    REPO_TABLE
                ),
                params![repo.name, repo.namespace],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(checksum.flatten())
    }

    /// Whether the repository was last synced from an index with this checksum
    pub fn repo_already_processed(&self, repo: &Repo, checksum: &str) -> Result<bool> {
        Ok(self.last_checksum(repo)?.as_deref() == Some(checksum))
    }

    /// Record a completed sync
    pub fn update_last_check(
        &self,
        namespace: &str,
        name: &str,
        checksum: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO {} (namespace, name, checksum, last_update) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (namespace, name) DO UPDATE SET last_update = $4, checksum = $3",
                REPO_TABLE
            ),
            params![namespace, name, checksum, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a repository with its charts and files
    pub fn delete_repo(&self, repo: &Repo) -> Result<()> {
        self.conn().execute(
            &format!("DELETE FROM {} WHERE name = $1 AND namespace = $2", REPO_TABLE),
            params![repo.name, repo.namespace],
        )?;
        Ok(())
    }
}

fn not_found(namespace: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        namespace: namespace.to_string(),
        id: id.to_string(),
    }
}

fn lookup(
    conn: &Connection,
    mode: &ChartLookup,
    table: &str,
    column: &str,
    namespace: &str,
    id: &str,
) -> Result<Option<String>> {
    let info = conn
        .query_row(
            &mode.select_sql(table, column),
            params![namespace, mode.param(id)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(info)
}

fn ensure_repo(conn: &Connection, namespace: &str, name: &str) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {} (namespace, name) VALUES ($1, $2) ON CONFLICT (namespace, name) DO NOTHING",
            REPO_TABLE
        ),
        params![namespace, name],
    )?;
    let id = conn.query_row(
        &format!("SELECT id FROM {} WHERE namespace = $1 AND name = $2", REPO_TABLE),
        params![namespace, name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Create the schema if it does not exist
fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS repos (
            id INTEGER PRIMARY KEY,
            namespace TEXT NOT NULL,
            name TEXT NOT NULL,
            checksum TEXT,
            last_update TEXT,
            UNIQUE(namespace, name)
        );

        CREATE TABLE IF NOT EXISTS charts (
            id INTEGER PRIMARY KEY,
            repo_name TEXT NOT NULL,
            repo_namespace TEXT NOT NULL,
            chart_id TEXT NOT NULL,
            info TEXT NOT NULL,
            UNIQUE(repo_name, repo_namespace, chart_id),
            FOREIGN KEY (repo_namespace, repo_name) REFERENCES repos (namespace, name) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            chart_id TEXT NOT NULL,
            repo_name TEXT NOT NULL,
            repo_namespace TEXT NOT NULL,
            chart_files_id TEXT NOT NULL,
            info TEXT NOT NULL,
            UNIQUE(repo_namespace, chart_files_id),
            FOREIGN KEY (repo_namespace, repo_name) REFERENCES repos (namespace, name) ON DELETE CASCADE,
            FOREIGN KEY (repo_name, repo_namespace, chart_id) REFERENCES charts (repo_name, repo_namespace, chart_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_charts_namespace_id ON charts(repo_namespace, chart_id);
        "#,
    )?;
    Ok(())
}
