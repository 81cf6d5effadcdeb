//! Version constraint expressions
//!
//! Accepts the range syntax used by chart repositories and maps it onto
//! `semver::VersionReq`: comparators separated by commas or whitespace are
//! ANDed, `||` separates alternatives, and `a - b` is an inclusive range.
//!
//! A version without an operator pins it: `1.0.0` is `=1.0.0` and a partial
//! `1.2` is `1.2.x`. `!=x` excludes a version by splitting its alternative in
//! two, one below `x` and one above.

use semver::{Version, VersionReq};

use crate::error::{RepoError, Result};

const OPERATORS: &[&str] = &["=", "!=", ">", ">=", "<", "<=", "~", "^", "~>"];

/// Parsed constraint: a version matches when any alternative matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    /// Parse a constraint expression
    pub fn parse(expr: &str) -> Result<Self> {
        let mut alternatives = Vec::new();
        for alt in expr.split("||") {
            for normalized in normalize(alt)? {
                let req = VersionReq::parse(&normalized).map_err(|e| RepoError::Parse {
                    message: format!("invalid version constraint '{}': {}", expr, e),
                })?;
                alternatives.push(req);
            }
        }
        Ok(Self { alternatives })
    }

    /// Any version without a pre-release
    pub fn latest_stable() -> Self {
        Self {
            alternatives: vec![VersionReq::STAR],
        }
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Rewrite one alternative into `VersionReq` syntax
///
/// Returns several requirements when the alternative excludes versions.
fn normalize(alt: &str) -> Result<Vec<String>> {
    let tokens: Vec<&str> = alt
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(RepoError::Parse {
            message: "empty version constraint".to_string(),
        });
    }

    let mut comparators: Vec<String> = Vec::with_capacity(tokens.len());
    let mut excluded: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        // Hyphen range: `1.2 - 1.4.5`
        if tokens.get(i + 1) == Some(&"-") {
            let Some(upper) = tokens.get(i + 2) else {
                return Err(incomplete_range(alt));
            };
            comparators.push(format!(">={}", token));
            comparators.push(format!("<={}", upper));
            i += 3;
            continue;
        }
        if token == "-" {
            return Err(incomplete_range(alt));
        }

        // Bare operator followed by its version: `>= 1.0`
        if OPERATORS.contains(&token) {
            let Some(version) = tokens.get(i + 1) else {
                return Err(RepoError::Parse {
                    message: format!("operator '{}' without a version", token),
                });
            };
            match token {
                "!=" => excluded.push(*version),
                "~>" => comparators.push(format!("~{}", version)),
                _ => comparators.push(format!("{}{}", token, version)),
            }
            i += 2;
            continue;
        }

        match token.strip_prefix("!=") {
            Some(version) => excluded.push(version),
            None => comparators.push(comparator(token)),
        }
        i += 1;
    }

    let mut sets = vec![comparators];
    for version in excluded {
        sets = sets
            .into_iter()
            .flat_map(|set| {
                ["<", ">"].map(|op| {
                    let mut split = set.clone();
                    split.push(format!("{}{}", op, version));
                    split
                })
            })
            .collect();
    }
    Ok(sets.into_iter().map(|set| set.join(", ")).collect())
}

/// One comparator with its operator attached
fn comparator(token: &str) -> String {
    if let Some(rest) = token.strip_prefix("~>") {
        return format!("~{}", rest);
    }
    if token.starts_with(['=', '>', '<', '~', '^']) || is_wildcard(token) {
        return token.to_string();
    }
    // `=1.2` is `1.2.x` in `VersionReq`, so partial versions need no rewrite
    format!("={}", token)
}

fn is_wildcard(token: &str) -> bool {
    token
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn incomplete_range(alt: &str) -> RepoError {
    RepoError::Parse {
        message: format!("incomplete range in '{}'", alt.trim()),
    }
}
