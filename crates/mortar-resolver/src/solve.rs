//! Candidate selection over ordered version sets.
//!
//! The solver always returns the highest satisfying version; an explicit pin
//! bypasses selection entirely. Candidates live in an ordered set so
//! identical inputs always produce identical outputs.

use std::collections::BTreeSet;

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::types::{Version, VersionRange};

/// Picks the best concrete version for a range from a fixed candidate set
#[derive(Debug, Clone)]
pub struct RangeSolver {
    candidates: BTreeSet<Version>,
}

impl RangeSolver {
    pub fn new(versions: Vec<Version>) -> Self {
        Self {
            candidates: versions.into_iter().collect(),
        }
    }

    /// Highest candidate satisfying the range
    pub fn select_best(&self, range: &VersionRange) -> Option<Version> {
        self.candidates
            .iter()
            .rev()
            .find(|v| range.matches(v))
            .cloned()
    }

    /// Highest candidate satisfying every range (range intersection)
    pub fn select_all_of(&self, ranges: &[&VersionRange]) -> Option<Version> {
        self.candidates
            .iter()
            .rev()
            .find(|v| ranges.iter().all(|r| r.matches(v)))
            .cloned()
    }

    /// All candidates satisfying the range, ascending
    pub fn matching(&self, range: &VersionRange) -> Vec<Version> {
        self.candidates
            .iter()
            .filter(|v| range.matches(v))
            .cloned()
            .collect()
    }

    /// Whether an exact version is among the candidates
    pub fn contains(&self, version: &Version) -> bool {
        self.candidates.contains(version)
    }

    /// Candidate list rendered for error messages
    pub fn available(&self) -> String {
        self.candidates
            .iter()
            .map(Version::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Like [`Self::select_best`], but failure becomes a `NoMatch` error
    pub fn require_best(&self, name: &str, range: &VersionRange) -> MortarResult<Version> {
        self.select_best(range).ok_or_else(|| MortarError::NoMatch {
            name: name.to_string(),
            range: range.to_string(),
            available: self.available(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(versions: &[&str]) -> RangeSolver {
        RangeSolver::new(versions.iter().map(|v| v.parse().unwrap()).collect())
    }

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_highest_satisfying_wins() {
        let s = solver(&["1.1.0", "1.2.0", "1.9.0", "2.0.0"]);
        let best = s.select_best(&range(">=1.2,<2.0")).unwrap();
        assert_eq!(best.to_string(), "1.9.0");
    }

    #[test]
    fn test_no_match_reports_candidates() {
        let s = solver(&["1.0.0", "1.1.0"]);
        let err = s.require_best("zlib", &range(">=2.0")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("zlib"));
        assert!(msg.contains(">=2.0"));
        assert!(msg.contains("1.1.0"));
    }

    #[test]
    fn test_intersection() {
        let s = solver(&["1.0.0", "1.2.0", "1.4.0", "2.0.0"]);
        let a = range(">=1.0");
        let b = range("<1.3");
        let best = s.select_all_of(&[&a, &b]).unwrap();
        assert_eq!(best.to_string(), "1.2.0");

        let c = range(">=3.0");
        assert!(s.select_all_of(&[&a, &c]).is_none());
    }

    #[test]
    fn test_prereleases_skipped_without_opt_in() {
        let s = solver(&["1.0.0", "2.0.0-rc.1"]);
        let best = s.select_best(&range("*")).unwrap();
        assert_eq!(best.to_string(), "1.0.0");
    }

    #[test]
    fn test_determinism_under_input_order() {
        let a = solver(&["1.0.0", "1.5.0", "1.2.0"]);
        let b = solver(&["1.5.0", "1.2.0", "1.0.0"]);
        let r = range("^1.0");
        assert_eq!(a.select_best(&r), b.select_best(&r));
    }
}
