//! Maven's version grammar: dot/hyphen-segmented tokens with qualifier
//! ordering, plus interval range notation (`[1.0,2.0)`). No published crate
//! in the retrieval pack covers this, so it is hand-rolled against the rules
//! stated in the design, in the same explicit, no-magic style as the rest of
//! this module (tokenize, then compare token-by-token).

use std::cmp::Ordering;

use crate::error::Result;
use crate::version::VersionScheme;

pub struct MavenScheme;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(u64),
    Qual(String),
}

impl Token {
    /// Lower rank sorts first. Unknown qualifiers fall between `rc` and the
    /// empty/"ga"/"final" qualifier, matching Maven's `ComparableVersion`.
    fn qualifier_rank(q: &str) -> i32 {
        match q.to_ascii_lowercase().as_str() {
            "alpha" | "a" => 0,
            "beta" | "b" => 1,
            "milestone" | "m" => 2,
            "rc" | "cr" => 3,
            "snapshot" => 4,
            "" | "ga" | "final" | "release" => 5,
            "sp" => 6,
            _ => 4, // unknown qualifiers sort alongside snapshot-ish pre-release text
        }
    }
}

fn tokenize(version: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    let mut flush = |buf: &mut String, tokens: &mut Vec<Token>| {
        if buf.is_empty() {
            return;
        }
        if let Ok(n) = buf.parse::<u64>() {
            tokens.push(Token::Num(n));
        } else {
            tokens.push(Token::Qual(buf.clone()));
        }
        buf.clear();
    };

    for c in version.chars() {
        if c == '.' || c == '-' {
            flush(&mut current, &mut tokens);
            current_is_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if let Some(was_digit) = current_is_digit {
            if was_digit != is_digit {
                flush(&mut current, &mut tokens);
            }
        }
        current.push(c);
        current_is_digit = Some(is_digit);
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn compare_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Num(x), Token::Num(y)) => x.cmp(y),
        (Token::Qual(x), Token::Qual(y)) => {
            Token::qualifier_rank(x).cmp(&Token::qualifier_rank(y)).then_with(|| x.cmp(y))
        }
        // A numeric token outranks a qualifier token at the same position
        // (e.g. "1.0" > "1.0-beta").
        (Token::Num(_), Token::Qual(q)) => {
            if Token::qualifier_rank(q) >= Token::qualifier_rank("") {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Token::Qual(q), Token::Num(_)) => compare_tokens(&Token::Num(0), &Token::Qual(q.clone())).reverse(),
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let len = ta.len().max(tb.len());
    let zero_num = Token::Num(0);
    let zero_qual = Token::Qual(String::new());
    for i in 0..len {
        let at = ta.get(i).unwrap_or(if tb.get(i).map(|t| matches!(t, Token::Num(_))).unwrap_or(true) {
            &zero_num
        } else {
            &zero_qual
        });
        let bt = tb.get(i).unwrap_or(if ta.get(i).map(|t| matches!(t, Token::Num(_))).unwrap_or(true) {
            &zero_num
        } else {
            &zero_qual
        });
        let ord = compare_tokens(at, bt);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

enum RangeBound {
    Inclusive(String),
    Exclusive(String),
    Unbounded,
}

struct Interval {
    low: RangeBound,
    high: RangeBound,
}

impl Interval {
    fn contains(&self, version: &str) -> bool {
        let low_ok = match &self.low {
            RangeBound::Inclusive(v) => compare_versions(version, v) != Ordering::Less,
            RangeBound::Exclusive(v) => compare_versions(version, v) == Ordering::Greater,
            RangeBound::Unbounded => true,
        };
        let high_ok = match &self.high {
            RangeBound::Inclusive(v) => compare_versions(version, v) != Ordering::Greater,
            RangeBound::Exclusive(v) => compare_versions(version, v) == Ordering::Less,
            RangeBound::Unbounded => true,
        };
        low_ok && high_ok
    }
}

fn parse_interval(text: &str) -> Option<Interval> {
    let text = text.trim();
    let open = text.chars().next()?;
    let close = text.chars().last()?;
    if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    let (low_text, high_text) = inner.split_once(',').unwrap_or((inner, inner));

    let low = if low_text.is_empty() {
        RangeBound::Unbounded
    } else if open == '[' {
        RangeBound::Inclusive(low_text.to_string())
    } else {
        RangeBound::Exclusive(low_text.to_string())
    };
    let high = if high_text.is_empty() {
        RangeBound::Unbounded
    } else if close == ']' {
        RangeBound::Inclusive(high_text.to_string())
    } else {
        RangeBound::Exclusive(high_text.to_string())
    };
    Some(Interval { low, high })
}

/// True if `constraint` is interval notation rather than a soft/recommended
/// version string.
#[must_use]
pub fn is_range(constraint: &str) -> bool {
    let t = constraint.trim();
    t.starts_with('[') || t.starts_with('(')
}

impl VersionScheme for MavenScheme {
    fn satisfies(&self, version: &str, constraint: &str) -> Result<bool> {
        let constraint = constraint.trim();
        if constraint.is_empty() {
            return Ok(true);
        }
        if is_range(constraint) {
            // Union of comma-separated intervals, e.g. "[1.0,2.0),[3.0,4.0)".
            let mut depth = 0i32;
            let mut parts = Vec::new();
            let mut start = 0usize;
            for (i, c) in constraint.char_indices() {
                match c {
                    '[' | '(' => depth += 1,
                    ']' | ')' => {
                        depth -= 1;
                        if depth == 0 {
                            parts.push(&constraint[start..=i]);
                            start = i + 1;
                        }
                    }
                    ',' if depth == 0 => start = i + 1,
                    _ => {}
                }
            }
            if parts.is_empty() {
                parts.push(constraint);
            }
            for part in parts {
                if let Some(interval) = parse_interval(part) {
                    if interval.contains(version) {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        } else {
            // Soft/recommended version: the resolver applies nearest-wins at
            // a higher level; at the grammar level this is an exact match.
            Ok(compare_versions(version, constraint) == Ordering::Equal)
        }
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(compare_versions(a, b))
    }

    fn is_prerelease(&self, version: &str) -> bool {
        tokenize(version)
            .iter()
            .any(|t| matches!(t, Token::Qual(q) if Token::qualifier_rank(q) < Token::qualifier_rank("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_ordering_alpha_before_beta_before_release() {
        assert_eq!(compare_versions("1.0-alpha", "1.0-beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0-beta", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0-sp"), Ordering::Less);
    }

    #[test]
    fn numeric_segments_compare_numerically_not_lexically() {
        assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
    }

    #[test]
    fn range_interval_containment() {
        let s = MavenScheme;
        assert!(s.satisfies("1.5", "[1.0,2.0)").unwrap());
        assert!(!s.satisfies("2.0", "[1.0,2.0)").unwrap());
        assert!(s.satisfies("2.0", "[1.0,2.0]").unwrap());
    }

    #[test]
    fn open_ended_range_has_no_upper_bound() {
        let s = MavenScheme;
        assert!(s.satisfies("999.0", "[1.0,)").unwrap());
    }

    #[test]
    fn soft_version_is_exact_match_at_grammar_level() {
        let s = MavenScheme;
        assert!(s.satisfies("5.3.0", "5.3.0").unwrap());
        assert!(!s.satisfies("5.3.1", "5.3.0").unwrap());
    }
}
