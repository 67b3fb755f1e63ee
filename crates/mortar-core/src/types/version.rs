//! Version and version-range types with one total ordering.
//!
//! Versions compare with semantic-version precedence when the string is
//! semver-shaped, and fall back to segment-wise comparison (numeric segments
//! compared numerically) otherwise. The same comparator is used everywhere a
//! version comparison occurs: range solving, conflict resolution, tie-breaks.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{MortarError, MortarResult};

/// One dot-separated identifier inside a version string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Purely numeric identifier, compared numerically
    Number(u64),
    /// Alphanumeric identifier, compared lexically
    Text(String),
}

impl Segment {
    fn parse(s: &str) -> Segment {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            match s.parse::<u64>() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::Text(s.to_string()), // overflows u64, keep textual
            }
        } else {
            Segment::Text(s.to_string())
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            // Numeric identifiers order below alphanumeric ones, as in
            // semver prerelease precedence.
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A concrete package version (`release[-prerelease][+build]`)
///
/// Build metadata is kept for display but ignored for precedence and
/// equality, matching semver.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    release: Vec<Segment>,
    prerelease: Vec<Segment>,
}

impl Version {
    /// The original version string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Release segments (the part before any `-prerelease`)
    pub fn release(&self) -> &[Segment] {
        &self.release
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    fn cmp_segments(a: &[Segment], b: &[Segment]) -> Ordering {
        for (x, y) in a.iter().zip(b.iter()) {
            match x.cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.release.hash(state);
        self.prerelease.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match Self::cmp_segments(&self.release, &other.release) {
            Ordering::Equal => match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                // A prerelease orders below the same release without one.
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                (false, false) => Self::cmp_segments(&self.prerelease, &other.prerelease),
            },
            other => other,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = MortarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(MortarError::MalformedReference {
                input: s.to_string(),
                reason: "empty version token".to_string(),
            });
        }
        if input.chars().any(|c| c.is_whitespace() || c == '/' || c == '@') {
            return Err(MortarError::MalformedReference {
                input: s.to_string(),
                reason: "version token contains reserved characters".to_string(),
            });
        }

        // Build metadata is carried in `raw` only.
        let version_part = match input.split_once('+') {
            Some((v, _)) => v,
            None => input,
        };

        let (core_part, pre_part) = match version_part.split_once('-') {
            Some((c, p)) => (c, Some(p)),
            None => (version_part, None),
        };

        let parse_segments = |part: &str, what: &str| -> MortarResult<Vec<Segment>> {
            part.split('.')
                .map(|seg| {
                    if seg.is_empty() {
                        Err(MortarError::MalformedReference {
                            input: s.to_string(),
                            reason: format!("empty {what} segment"),
                        })
                    } else {
                        Ok(Segment::parse(seg))
                    }
                })
                .collect()
        };

        let release = parse_segments(core_part, "release")?;
        let prerelease = match pre_part {
            Some(p) => parse_segments(p, "prerelease")?,
            None => Vec::new(),
        };

        Ok(Version {
            raw: input.to_string(),
            release,
            prerelease,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Comparison operator for range atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exact,     // =1.0.0
    Greater,   // >1.0.0
    GreaterEq, // >=1.0.0
    Less,      // <1.0.0
    LessEq,    // <=1.0.0
    Tilde,     // ~1.4
    Caret,     // ^1.2.3
}

/// Single comparator atom of a range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Exact => v == &self.version,
            Op::Greater => v > &self.version,
            Op::GreaterEq => v >= &self.version,
            Op::Less => v < &self.version,
            Op::LessEq => v <= &self.version,
            Op::Tilde => {
                // Same leading release segments up to the precision given
                // (at most major.minor), and at least the given version.
                let prefix = self.version.release.len().min(2);
                v >= &self.version && v.release.get(..prefix) == self.version.release.get(..prefix)
            },
            Op::Caret => {
                // Same release prefix up to and including the first
                // non-zero segment (npm caret semantics).
                let pivot = self
                    .version
                    .release
                    .iter()
                    .position(|s| !matches!(s, Segment::Number(0)))
                    .unwrap_or(self.version.release.len().saturating_sub(1));
                let prefix = (pivot + 1).min(self.version.release.len());
                v >= &self.version && v.release.get(..prefix) == self.version.release.get(..prefix)
            },
        }
    }
}

/// A version-range expression over comparator atoms
///
/// Comma-separated atoms are conjoined (`>=1.2,<2.0` matches versions
/// satisfying both). A bare `*` matches every non-prerelease version. An
/// empty comparator list is the wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    comparators: Vec<Comparator>,
}

impl VersionRange {
    /// Parse a range expression. Surrounding brackets are tolerated.
    pub fn parse(s: &str) -> MortarResult<VersionRange> {
        let raw = s.trim();
        let inner = raw
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .unwrap_or(raw)
            .trim();

        if inner.is_empty() {
            return Err(MortarError::MalformedReference {
                input: s.to_string(),
                reason: "empty version range".to_string(),
            });
        }

        let mut comparators = Vec::new();
        for atom in inner.split(',').map(str::trim) {
            if atom.is_empty() {
                return Err(MortarError::MalformedReference {
                    input: s.to_string(),
                    reason: "empty range atom".to_string(),
                });
            }
            if atom == "*" {
                continue; // wildcard constrains nothing
            }
            let (op, rest) = if let Some(rest) = atom.strip_prefix(">=") {
                (Op::GreaterEq, rest)
            } else if let Some(rest) = atom.strip_prefix("<=") {
                (Op::LessEq, rest)
            } else if let Some(rest) = atom.strip_prefix('>') {
                (Op::Greater, rest)
            } else if let Some(rest) = atom.strip_prefix('<') {
                (Op::Less, rest)
            } else if let Some(rest) = atom.strip_prefix('~') {
                (Op::Tilde, rest)
            } else if let Some(rest) = atom.strip_prefix('^') {
                (Op::Caret, rest)
            } else if let Some(rest) = atom.strip_prefix('=') {
                (Op::Exact, rest)
            } else {
                (Op::Exact, atom)
            };
            let version = Version::from_str(rest.trim())?;
            comparators.push(Comparator { op, version });
        }

        Ok(VersionRange {
            raw: raw.to_string(),
            comparators,
        })
    }

    /// Check whether a concrete version satisfies this range.
    ///
    /// Prerelease versions only match when one of the comparators names a
    /// prerelease itself; a wildcard or plain range never selects one.
    pub fn matches(&self, v: &Version) -> bool {
        if v.is_prerelease() && !self.comparators.iter().any(|c| c.version.is_prerelease()) {
            return false;
        }
        self.comparators.iter().all(|c| c.matches(v))
    }

    /// The original range expression
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when this range constrains nothing
    pub fn is_wildcard(&self) -> bool {
        self.comparators.is_empty()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Either a concrete pinned version or a range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionExpr {
    Pin(Version),
    Range(VersionRange),
}

impl VersionExpr {
    /// Parse a version-or-range token.
    ///
    /// Bracketed tokens and tokens carrying comparator syntax become ranges;
    /// everything else is a concrete pin.
    pub fn parse(s: &str) -> MortarResult<VersionExpr> {
        let token = s.trim();
        let looks_like_range = token.starts_with('[')
            || token.contains(['>', '<', '=', '~', '^', ',', '*']);
        if looks_like_range {
            Ok(VersionExpr::Range(VersionRange::parse(token)?))
        } else {
            Ok(VersionExpr::Pin(Version::from_str(token)?))
        }
    }

    /// The pinned version, if this expression is an exact pin
    pub fn as_pin(&self) -> Option<&Version> {
        match self {
            VersionExpr::Pin(v) => Some(v),
            VersionExpr::Range(_) => None,
        }
    }

    /// Check whether a concrete version satisfies this expression
    pub fn matches(&self, v: &Version) -> bool {
        match self {
            VersionExpr::Pin(p) => p == v,
            VersionExpr::Range(r) => r.matches(v),
        }
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionExpr::Pin(v) => write!(f, "{v}"),
            VersionExpr::Range(r) => write!(f, "{r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_semver() {
        let ver = v("1.2.3");
        assert_eq!(ver.release().len(), 3);
        assert!(!ver.is_prerelease());
        assert_eq!(ver.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_prerelease_and_build() {
        let ver = v("1.0.0-alpha.1+build5");
        assert!(ver.is_prerelease());
        // Build metadata ignored for precedence
        assert_eq!(v("1.0.0+a"), v("1.0.0+b"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("1..2").is_err());
        assert!(Version::from_str("1.0 beta").is_err());
        assert!(Version::from_str("1.0/2").is_err());
    }

    #[test]
    fn test_semver_precedence() {
        assert!(v("1.2.3") < v("1.2.10"));
        assert!(v("1.2.3") < v("1.3.0"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.2"));
        assert!(v("1.0.0-1") < v("1.0.0-alpha")); // numeric below alphanumeric
    }

    #[test]
    fn test_fallback_precedence() {
        // Not semver-shaped, still totally ordered
        assert!(v("1.2") < v("1.2.0"));
        assert!(v("1.2.3.4") < v("1.2.3.5"));
        assert!(v("2021.3") < v("2021.10"));
        assert!(v("cci.20210101") < v("cci.20220101"));
    }

    #[test]
    fn test_range_and() {
        let r = VersionRange::parse(">=1.2,<2.0").unwrap();
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.9.9")));
        assert!(!r.matches(&v("2.0.0")));
        assert!(!r.matches(&v("1.1.0")));
    }

    #[test]
    fn test_range_tilde() {
        let r = VersionRange::parse("~1.4").unwrap();
        assert!(r.matches(&v("1.4.0")));
        assert!(r.matches(&v("1.4.9")));
        assert!(!r.matches(&v("1.5.0")));
    }

    #[test]
    fn test_range_caret() {
        let r = VersionRange::parse("^1.2.3").unwrap();
        assert!(r.matches(&v("1.2.3")));
        assert!(r.matches(&v("1.9.0")));
        assert!(!r.matches(&v("2.0.0")));

        let r0 = VersionRange::parse("^0.2.3").unwrap();
        assert!(r0.matches(&v("0.2.9")));
        assert!(!r0.matches(&v("0.3.0")));
    }

    #[test]
    fn test_range_wildcard() {
        let r = VersionRange::parse("*").unwrap();
        assert!(r.is_wildcard());
        assert!(r.matches(&v("0.0.1")));
        assert!(r.matches(&v("99.0.0")));
        assert!(!r.matches(&v("1.0.0-rc.1"))); // prereleases need opt-in
    }

    #[test]
    fn test_range_prerelease_opt_in() {
        let r = VersionRange::parse(">=1.0.0-alpha").unwrap();
        assert!(r.matches(&v("1.0.0-beta")));
        assert!(r.matches(&v("1.0.0")));
    }

    #[test]
    fn test_range_brackets() {
        let r = VersionRange::parse("[>=1.2, <2.0]").unwrap();
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("2.1.0")));
    }

    #[test]
    fn test_range_rejects_garbage() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse(">=1.0,,<2.0").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }

    #[test]
    fn test_expr_classification() {
        assert!(matches!(VersionExpr::parse("1.2.3").unwrap(), VersionExpr::Pin(_)));
        assert!(matches!(VersionExpr::parse(">=1.2").unwrap(), VersionExpr::Range(_)));
        assert!(matches!(VersionExpr::parse("*").unwrap(), VersionExpr::Range(_)));
        assert!(matches!(VersionExpr::parse("[~1.4]").unwrap(), VersionExpr::Range(_)));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_version() -> impl Strategy<Value = Version> {
        (
            prop::collection::vec(0u64..50, 1..4),
            prop::option::of(prop::collection::vec("[a-z0-9]{1,4}", 1..3)),
        )
            .prop_map(|(release, pre)| {
                let mut s = release
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                if let Some(pre) = pre {
                    s.push('-');
                    s.push_str(&pre.join("."));
                }
                s.parse::<Version>().unwrap()
            })
    }

    proptest! {
        // Ordering must be total and consistent: the same comparator is used
        // everywhere version comparison occurs.
        #[test]
        fn ordering_is_antisymmetric(a in arb_version(), b in arb_version()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn ordering_is_transitive(a in arb_version(), b in arb_version(), c in arb_version()) {
            let mut sorted = vec![a, b, c];
            sorted.sort();
            prop_assert!(sorted[0] <= sorted[1] && sorted[1] <= sorted[2]);
            prop_assert!(sorted[0] <= sorted[2]);
        }

        #[test]
        fn parse_display_round_trip(a in arb_version()) {
            let reparsed: Version = a.to_string().parse().unwrap();
            prop_assert_eq!(a, reparsed);
        }
    }
}
