//! npm's semver range grammar (`^`, `~`, `>=`, `<`, `||`, hyphen ranges,
//! `*`/`x`), delegated to the `node-semver` crate which implements the exact
//! range semantics npm itself uses rather than plain Cargo-style semver.

use std::cmp::Ordering;
use std::str::FromStr;

use node_semver::{Range, Version};

use crate::error::Result;
use crate::version::{parse_error, VersionScheme};

pub struct NpmSemverScheme;

impl VersionScheme for NpmSemverScheme {
    fn satisfies(&self, version: &str, constraint: &str) -> Result<bool> {
        let trimmed = constraint.trim();
        if trimmed.is_empty() || trimmed == "*" || trimmed == "latest" {
            return Ok(true);
        }
        let v = Version::from_str(version).map_err(|e| parse_error("semver version", e.to_string()))?;
        let range = Range::parse(trimmed).map_err(|e| parse_error("semver range", e.to_string()))?;
        Ok(range.satisfies(&v))
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        let va = Version::from_str(a).map_err(|e| parse_error("semver version", e.to_string()))?;
        let vb = Version::from_str(b).map_err(|e| parse_error("semver version", e.to_string()))?;
        Ok(va.cmp(&vb))
    }

    fn is_prerelease(&self, version: &str) -> bool {
        Version::from_str(version)
            .map(|v| !v.pre_release.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_range_matches_same_major() {
        let s = NpmSemverScheme;
        assert!(s.satisfies("1.4.2", "^1.2.0").unwrap());
        assert!(!s.satisfies("2.0.0", "^1.2.0").unwrap());
    }

    #[test]
    fn tilde_range_matches_same_minor() {
        let s = NpmSemverScheme;
        assert!(s.satisfies("1.2.9", "~1.2.0").unwrap());
        assert!(!s.satisfies("1.3.0", "~1.2.0").unwrap());
    }

    #[test]
    fn wildcard_matches_anything() {
        let s = NpmSemverScheme;
        assert!(s.satisfies("9.9.9", "*").unwrap());
    }

    #[test]
    fn prerelease_is_detected() {
        let s = NpmSemverScheme;
        assert!(s.is_prerelease("1.0.0-beta.1"));
        assert!(!s.is_prerelease("1.0.0"));
    }
}
