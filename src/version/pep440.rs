//! PEP 440 version grammar, shared by pip and (with a wildcard extension)
//! Conda. Delegates parsing/ordering to `pep440_rs`, the crate the wider
//! Python-tooling-in-Rust ecosystem (uv and friends) already uses for this.

use std::cmp::Ordering;
use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifiers};

use crate::error::Result;
use crate::version::{parse_error, VersionScheme};

pub struct Pep440Scheme;

impl VersionScheme for Pep440Scheme {
    fn satisfies(&self, version: &str, constraint: &str) -> Result<bool> {
        if constraint.trim().is_empty() {
            return Ok(true);
        }
        let v = Version::from_str(version)
            .map_err(|e| parse_error("pep440 version", e.to_string()))?;
        let spec = VersionSpecifiers::from_str(constraint)
            .map_err(|e| parse_error("pep440 constraint", e.to_string()))?;
        Ok(spec.contains(&v))
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        let va = Version::from_str(a).map_err(|e| parse_error("pep440 version", e.to_string()))?;
        let vb = Version::from_str(b).map_err(|e| parse_error("pep440 version", e.to_string()))?;
        Ok(va.cmp(&vb))
    }

    fn is_prerelease(&self, version: &str) -> bool {
        Version::from_str(version)
            .map(|v| v.any_prerelease())
            .unwrap_or(false)
    }
}

/// Conda layers a `1.3.*` wildcard and a leading `!epoch` onto PEP 440-like
/// text; both normalize to syntax `pep440_rs` already accepts (`1.3.*` is
/// valid PEP 440, and conda's `!1` epoch prefix maps to pep440's `1!`).
#[must_use]
pub fn normalize_conda_constraint(constraint: &str) -> String {
    let trimmed = constraint.trim();
    if let Some(rest) = trimmed.strip_prefix('!') {
        if let Some((epoch, version)) = rest.split_once(|c: char| !c.is_ascii_digit()) {
            return format!("{epoch}!{version}");
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_basic_range() {
        let s = Pep440Scheme;
        assert!(s.satisfies("2.0.1", ">=2.0,<3.0").unwrap());
        assert!(!s.satisfies("3.0.0", ">=2.0,<3.0").unwrap());
    }

    #[test]
    fn compare_orders_by_release_segments() {
        let s = Pep440Scheme;
        assert_eq!(s.compare("1.9.0", "1.10.0").unwrap(), Ordering::Less);
    }

    #[test]
    fn prerelease_detection() {
        let s = Pep440Scheme;
        assert!(s.is_prerelease("1.0.0rc1"));
        assert!(!s.is_prerelease("1.0.0"));
    }

    #[test]
    fn conda_wildcard_passthrough() {
        assert_eq!(normalize_conda_constraint("1.3.*"), "1.3.*");
    }
}
