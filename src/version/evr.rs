//! RPM/YUM `Epoch:Version-Release` grammar. Like Maven, no crate in the
//! retrieval pack implements this, so `rpmvercmp` is hand-rolled directly
//! from its well-known segment-wise comparison rule: runs of digits and runs
//! of letters are compared separately, a leading `~` always sorts lowest,
//! and a numeric segment always outranks an alpha segment at the same
//! position.

use std::cmp::Ordering;

use crate::error::Result;
use crate::version::VersionScheme;

pub struct EvrScheme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let (epoch, rest) = match text.split_once(':') {
            Some((e, rest)) => (e.parse().unwrap_or(0), rest),
            None => (0, text),
        };
        match rest.split_once('-') {
            Some((v, r)) => Evr {
                epoch,
                version: v.to_string(),
                release: Some(r.to_string()),
            },
            None => Evr {
                epoch,
                version: rest.to_string(),
                release: None,
            },
        }
    }
}

fn is_segment_boundary(c: char) -> bool {
    !c.is_ascii_alphanumeric() && c != '~'
}

/// The canonical RPM version-string comparator, operating on one of
/// `version` or `release` at a time (EVR compares epoch, then version, then
/// release, each via this function).
#[must_use]
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    let mut a = a;
    let mut b = b;

    loop {
        // Skip segment-separator characters (anything but alnum/~) on both sides.
        a = a.trim_start_matches(|c| is_segment_boundary(c) && c != '~');
        b = b.trim_start_matches(|c| is_segment_boundary(c) && c != '~');

        let a_tilde = a.starts_with('~');
        let b_tilde = b.starts_with('~');
        if a_tilde || b_tilde {
            if a_tilde && !b_tilde {
                return Ordering::Less;
            }
            if b_tilde && !a_tilde {
                return Ordering::Greater;
            }
            a = &a[1..];
            b = &b[1..];
            continue;
        }

        if a.is_empty() && b.is_empty() {
            return Ordering::Equal;
        }
        if a.is_empty() {
            return Ordering::Less;
        }
        if b.is_empty() {
            return Ordering::Greater;
        }

        let a_digit = a.chars().next().unwrap().is_ascii_digit();
        let b_digit = b.chars().next().unwrap().is_ascii_digit();

        let (a_seg, a_rest) = take_segment(a, a_digit);
        let (b_seg, b_rest) = take_segment(b, b_digit);

        if a_digit != b_digit {
            // Numeric beats alpha at the same position regardless of content.
            return if a_digit { Ordering::Greater } else { Ordering::Less };
        }

        let ord = if a_digit {
            let a_trimmed = a_seg.trim_start_matches('0');
            let b_trimmed = b_seg.trim_start_matches('0');
            a_trimmed
                .len()
                .cmp(&b_trimmed.len())
                .then_with(|| a_trimmed.cmp(b_trimmed))
        } else {
            a_seg.cmp(b_seg)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        a = a_rest;
        b = b_rest;
    }
}

fn take_segment(s: &str, digit: bool) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digit || is_segment_boundary(*c))
        .map_or(s.len(), |(i, _)| i);
    s.split_at(end)
}

fn compare_evr(a: &Evr, b: &Evr) -> Ordering {
    a.epoch
        .cmp(&b.epoch)
        .then_with(|| rpmvercmp(&a.version, &b.version))
        .then_with(|| match (&a.release, &b.release) {
            (Some(ra), Some(rb)) => rpmvercmp(ra, rb),
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
        })
}

impl VersionScheme for EvrScheme {
    fn satisfies(&self, version: &str, constraint: &str) -> Result<bool> {
        let constraint = constraint.trim();
        if constraint.is_empty() {
            return Ok(true);
        }
        let (op, rest) = split_operator(constraint);
        let want = Evr::parse(rest.trim());
        let have = Evr::parse(version);
        let ord = compare_evr(&have, &want);
        Ok(match op {
            "=" | "==" => ord == Ordering::Equal,
            ">=" => ord != Ordering::Less,
            "<=" => ord != Ordering::Greater,
            ">" => ord == Ordering::Greater,
            "<" => ord == Ordering::Less,
            "!=" => ord != Ordering::Equal,
            _ => ord == Ordering::Equal,
        })
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(compare_evr(&Evr::parse(a), &Evr::parse(b)))
    }

    fn is_prerelease(&self, _version: &str) -> bool {
        // RPM has no standard prerelease marker distinct from its release
        // tag conventions (e.g. ".rc1" inside release); not modeled.
        false
    }
}

fn split_operator(constraint: &str) -> (&str, &str) {
    for op in ["==", ">=", "<=", "!=", "=", ">", "<"] {
        if let Some(rest) = constraint.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("=", constraint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epoch_version_release() {
        let evr = Evr::parse("2:1.2.3-4.el8");
        assert_eq!(evr.epoch, 2);
        assert_eq!(evr.version, "1.2.3");
        assert_eq!(evr.release.as_deref(), Some("4.el8"));
    }

    #[test]
    fn missing_epoch_defaults_to_zero() {
        assert_eq!(Evr::parse("1.2.3-4").epoch, 0);
    }

    #[test]
    fn rpmvercmp_numeric_segments() {
        assert_eq!(rpmvercmp("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn rpmvercmp_tilde_sorts_lowest() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
    }

    #[test]
    fn epoch_dominates_version_comparison() {
        let s = EvrScheme;
        assert_eq!(s.compare("0:9.9.9-1", "1:0.0.1-1").unwrap(), Ordering::Less);
    }

    #[test]
    fn satisfies_with_operator() {
        let s = EvrScheme;
        assert!(s.satisfies("2.4.6-1", ">=2.4.0").unwrap());
        assert!(!s.satisfies("2.3.0-1", ">=2.4.0").unwrap());
    }
}
