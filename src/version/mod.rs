//! Version grammar + constraint engine (spec 4.1): one parser per ecosystem,
//! all exposing `satisfies`/`compare`/`sort_key` behind the `VersionScheme`
//! trait so resolvers stay ecosystem-agnostic about version text.

pub mod evr;
pub mod maven;
pub mod npm_semver;
pub mod pep440;

use std::cmp::Ordering;

use crate::coordinate::Ecosystem;
use crate::error::{DepotError, Result};

/// A parsed, ecosystem-specific version grammar. Implementors wrap whatever
/// crate or hand-rolled parser suits the grammar (pep440_rs for pip/conda,
/// node-semver for npm, hand-rolled for Maven/EVR).
pub trait VersionScheme {
    fn satisfies(&self, version: &str, constraint: &str) -> Result<bool>;
    fn compare(&self, a: &str, b: &str) -> Result<Ordering>;
    /// True if `version` is a pre-release under this ecosystem's grammar;
    /// used by "latest" tie-breaking, which excludes prereleases unless the
    /// constraint explicitly names one (spec 4.1).
    fn is_prerelease(&self, version: &str) -> bool;
}

#[must_use]
pub fn scheme_for(ecosystem: Ecosystem) -> Box<dyn VersionScheme + Send + Sync> {
    match ecosystem {
        Ecosystem::Pip | Ecosystem::Conda => Box::new(pep440::Pep440Scheme),
        Ecosystem::Npm => Box::new(npm_semver::NpmSemverScheme),
        Ecosystem::Maven => Box::new(maven::MavenScheme),
        Ecosystem::Yum => Box::new(evr::EvrScheme),
        Ecosystem::Docker => Box::new(npm_semver::NpmSemverScheme),
    }
}

/// Picks the highest version satisfying `constraint` among `candidates`,
/// excluding prereleases unless `constraint` names one explicitly (detected
/// heuristically: the constraint text itself contains a prerelease marker).
pub fn select_best<'a>(
    scheme: &dyn VersionScheme,
    candidates: impl IntoIterator<Item = &'a str>,
    constraint: &str,
) -> Result<Option<&'a str>> {
    let constraint_names_prerelease = scheme.is_prerelease(constraint.trim_start_matches(|c: char| {
        matches!(c, '=' | '<' | '>' | '~' | '^' | '!' | ' ' | ',')
    }));

    let mut best: Option<&'a str> = None;
    for candidate in candidates {
        if !scheme.satisfies(candidate, constraint)? {
            continue;
        }
        if scheme.is_prerelease(candidate) && !constraint_names_prerelease {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(current) => {
                if scheme.compare(candidate, current)? == Ordering::Greater {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best)
}

pub(crate) fn parse_error(context: &str, message: impl Into<String>) -> DepotError {
    DepotError::ParseError {
        context: context.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_best_excludes_prereleases_by_default() {
        let scheme = pep440::Pep440Scheme;
        let candidates = vec!["1.0.0", "1.1.0rc1", "1.0.5"];
        let best = select_best(&scheme, candidates, ">=1.0.0").unwrap();
        assert_eq!(best, Some("1.0.5"));
    }
}
