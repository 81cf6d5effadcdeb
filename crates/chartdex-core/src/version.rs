//! Lenient semantic version parsing
//!
//! Chart repositories in the wild publish versions like `v1.2` or `2`. These
//! are accepted by padding the missing components with zeros and dropping a
//! leading `v`, so that `v1.2` parses as `1.2.0`.

use semver::Version;

/// Parse a version string, normalizing partial versions
///
/// Examples:
/// - "1" -> 1.0.0
/// - "v1.2" -> 1.2.0
/// - "1.2.3-rc.1+build.5" -> 1.2.3-rc.1+build.5
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split_at);

    let normalized = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => trimmed.to_string(),
    };
    Version::parse(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_lenient("v1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_lenient("2"), Some(Version::new(2, 0, 0)));
        assert_eq!(
            parse_lenient("1.0-beta.1").map(|v| v.to_string()),
            Some("1.0.0-beta.1".to_string())
        );
        assert_eq!(
            parse_lenient("1.2.3+build.7").map(|v| v.build.to_string()),
            Some("build.7".to_string())
        );
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("latest").is_none());
        assert!(parse_lenient("1.2.3.4").is_none());
        assert!(parse_lenient("v").is_none());
    }
}
