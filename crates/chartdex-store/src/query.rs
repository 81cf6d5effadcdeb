//! Catalog query construction
//!
//! Filters are rendered into a `WHERE` clause with positional `$N`
//! placeholders plus the matching parameter list. Placeholders are numbered
//! in the order they first appear, so the parameters bind positionally.
//! User input never reaches the SQL text.

use crate::error::{Result, StoreError};

/// Namespace value that disables namespace filtering
pub const ALL_NAMESPACES: &str = "_all";

pub(crate) const CHART_TABLE: &str = "charts";
pub(crate) const FILES_TABLE: &str = "files";
pub(crate) const REPO_TABLE: &str = "repos";

/// Filters for listing charts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartQuery {
    /// Requesting namespace, or [`ALL_NAMESPACES`]
    pub namespace: String,
    /// Exact chart name
    pub chart_name: String,
    /// Chart version; only applied together with `app_version`
    pub version: String,
    /// App version; only applied together with `version`
    pub app_version: String,
    /// Repository names, any of which may match
    pub repos: Vec<String>,
    /// Categories, any of which may match
    pub categories: Vec<String>,
    /// Case-insensitive substring searched across descriptive fields
    pub search_query: String,
}

impl ChartQuery {
    /// Query everything visible from `namespace`
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Rendered `WHERE` clause and its positional parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereClause {
    /// Empty when no filter applies
    pub sql: String,
    pub params: Vec<String>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

#[derive(Default)]
struct ClauseBuilder {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl ClauseBuilder {
    /// Register a parameter and return its placeholder number
    fn bind(&mut self, value: impl Into<String>) -> usize {
        self.params.push(value.into());
        self.params.len()
    }

    fn push(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn any_of(&mut self, values: &[String], render: impl Fn(usize) -> String) {
        let alternatives: Vec<String> = values
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| {
                let n = self.bind(v.as_str());
                render(n)
            })
            .collect();
        if !alternatives.is_empty() {
            self.push(format!("({})", alternatives.join(" OR ")));
        }
    }

    fn finish(self) -> WhereClause {
        if self.clauses.is_empty() {
            return WhereClause {
                sql: String::new(),
                params: self.params,
            };
        }
        WhereClause {
            sql: format!("WHERE {}", self.clauses.join(" AND ")),
            params: self.params,
        }
    }
}

/// Build the `WHERE` clause for a chart query
///
/// Unless the namespace is [`ALL_NAMESPACES`], charts from the requesting
/// namespace and from `global_namespace` are visible. The version filter is
/// only applied when both the version and the app version are set, and both
/// must consist of `[A-Za-z0-9+\-.]`.
pub fn generate_where_clause(query: &ChartQuery, global_namespace: &str) -> Result<WhereClause> {
    let mut builder = ClauseBuilder::default();

    if query.namespace != ALL_NAMESPACES {
        let own = builder.bind(query.namespace.as_str());
        let global = builder.bind(global_namespace);
        builder.push(format!(
            "(repo_namespace = ${} OR repo_namespace = ${})",
            own, global
        ));
    }

    if !query.chart_name.is_empty() {
        let n = builder.bind(query.chart_name.as_str());
        builder.push(format!("(info->>'name' = ${})", n));
    }

    if !query.version.is_empty() && !query.app_version.is_empty() {
        validate_version("version", &query.version)?;
        validate_version("app version", &query.app_version)?;
        // Both values are restricted to characters that need no JSON escaping
        let n = builder.bind(format!(
            r#"[{{"version":"{}","app_version":"{}"}}]"#,
            query.version, query.app_version
        ));
        builder.push(format!(
            "(EXISTS (SELECT 1 FROM json_each(info, '$.chartVersions') AS have, json_each(${n}) AS want \
             WHERE have.value ->> 'version' = want.value ->> 'version' \
             AND have.value ->> 'app_version' = want.value ->> 'app_version'))"
        ));
    }

    builder.any_of(&query.repos, |n| format!("(repo_name = ${})", n));
    builder.any_of(&query.categories, |n| format!("info->>'category' = ${}", n));

    if !query.search_query.is_empty() {
        let n = builder.bind(format!("%{}%", query.search_query));
        builder.push(format!(
            "((info ->> 'name' LIKE ${n}) OR \
             (info ->> 'description' LIKE ${n}) OR \
             (info -> 'repo' ->> 'name' LIKE ${n}) OR \
             (info ->> 'keywords' LIKE ${n}) OR \
             (info ->> 'sources' LIKE ${n}) OR \
             (EXISTS (SELECT 1 FROM json_each(info, '$.maintainers') WHERE value ->> 'name' LIKE ${n})))"
        ));
    }

    Ok(builder.finish())
}

fn validate_version(field: &str, value: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.');
    if value.chars().all(allowed) {
        Ok(())
    } else {
        Err(StoreError::Validation {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// `LIMIT`/`OFFSET` suffix; empty when neither applies
pub fn pagination_clause(offset: usize, page_size: usize) -> String {
    match (offset, page_size) {
        (0, 0) => String::new(),
        (0, size) => format!("LIMIT {}", size),
        // SQLite only accepts OFFSET after a LIMIT
        (offset, 0) => format!("LIMIT -1 OFFSET {}", offset),
        (offset, size) => format!("LIMIT {} OFFSET {}", size, offset),
    }
}

fn join_sql(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordered, paginated chart listing
pub fn chart_list_sql(where_clause: &WhereClause, offset: usize, page_size: usize) -> String {
    let from = format!("SELECT info FROM {}", CHART_TABLE);
    let pagination = pagination_clause(offset, page_size);
    join_sql(&[
        &from,
        &where_clause.sql,
        "ORDER BY (info->>'name') ASC",
        &pagination,
    ])
}

/// Category histogram
pub fn categories_sql(where_clause: &WhereClause) -> String {
    let select = format!(
        "SELECT (info ->> 'category') AS name, COUNT( (info ->> 'category')) AS count FROM {}",
        CHART_TABLE
    );
    join_sql(&[
        &select,
        &where_clause.sql,
        "GROUP BY (info ->> 'category') ORDER BY (info ->> 'category') ASC",
    ])
}

/// How a chart or files ID is matched
///
/// `Fallback` exists for mirrored charts: a chart stored as
/// `jfrog/bitnami/wordpress` may be requested as `jfrog/wordpress`. It
/// matches by pattern and returns the first row, not the best one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartLookup {
    Exact,
    Fallback { pattern: String },
}

impl ChartLookup {
    /// The fallback for an ID of exactly two `/` segments
    pub fn fallback_for(id: &str) -> Option<Self> {
        let mut segments = id.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(repo), Some(name), None) => Some(ChartLookup::Fallback {
                pattern: format!("{}%{}", repo, name),
            }),
            _ => None,
        }
    }

    /// `SELECT info` statement over `table`, matching `column` against `$2`
    pub(crate) fn select_sql(&self, table: &str, column: &str) -> String {
        match self {
            ChartLookup::Exact => format!(
                "SELECT info FROM {} WHERE repo_namespace = $1 AND {} = $2",
                table, column
            ),
            ChartLookup::Fallback { .. } => format!(
                "SELECT info FROM {} WHERE repo_namespace = $1 AND {} LIKE $2 LIMIT 1",
                table, column
            ),
        }
    }

    /// Value bound to `$2`
    pub(crate) fn param<'a>(&'a self, id: &'a str) -> &'a str {
        match self {
            ChartLookup::Exact => id,
            ChartLookup::Fallback { pattern } => pattern,
        }
    }
}
