//! Chart identifiers
//!
//! A chart ID is `"{repoName}/{escapedName}"`. Chart names may themselves
//! contain separators (`foo/bar`), so the name is percent-escaped as a single
//! path segment and `unescape(escape(name)) == name` always holds.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::{CoreError, Result};

/// Characters left untouched when escaping a name as a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Escape a chart name so it can be used as one ID segment
pub fn escape_chart_name(name: &str) -> String {
    utf8_percent_encode(name, PATH_SEGMENT).to_string()
}

/// Compose a chart ID from a repository name and a raw chart name
pub fn chart_id(repo_name: &str, chart_name: &str) -> String {
    format!("{}/{}", repo_name, escape_chart_name(chart_name))
}

/// Unescape a value, returning it unchanged when it is not valid escaped UTF-8
pub fn unescape_or_default(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Decode a URI-escaped chart ID and check it has the `repo/name` shape
pub fn unescape_chart_id(id: &str) -> Result<String> {
    let unescaped = percent_decode_str(id)
        .decode_utf8()
        .map_err(|e| CoreError::InvalidChartId {
            id: id.to_string(),
            reason: e.to_string(),
        })?
        .into_owned();

    if unescaped.split('/').count() != 2 {
        return Err(CoreError::InvalidChartId {
            id: id.to_string(),
            reason: "expected the 'repo/name' form".to_string(),
        });
    }
    Ok(unescaped)
}
