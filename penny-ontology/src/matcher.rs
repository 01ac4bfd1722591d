//! Relation name matching.
//!
//! Decides whether a desired relation already exists under an equivalent
//! name. Exact matches under [`normalize_name`] are always reused. Near
//! matches within a small edit distance are reused too, but the result
//! carries a [`FuzzyReuseWarning`] so the caller can audit the decision.

use penny_types::{LiveRelation, RelationId, normalize_name};
use serde::{Deserialize, Serialize};

/// Largest edit distance still treated as the same relation.
pub const DEFAULT_MAX_DISTANCE: usize = 2;

/// Shortest normalized name eligible for fuzzy matching.
pub const DEFAULT_MIN_FUZZY_LEN: usize = 4;

/// Annotation attached to a reuse that was not an exact normalized match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyReuseWarning {
    pub desired: String,
    pub matched: String,
    pub distance: usize,
}

/// Outcome of matching one desired name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Reused {
        id: RelationId,
        matched_name: String,
        fuzzy: Option<FuzzyReuseWarning>,
    },
    NotFound,
}

impl MatchResult {
    pub fn is_reused(&self) -> bool {
        matches!(self, MatchResult::Reused { .. })
    }
}

/// Matches desired relation names against the live relation dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationMatcher {
    max_distance: usize,
    min_fuzzy_len: usize,
}

impl Default for RelationMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISTANCE, DEFAULT_MIN_FUZZY_LEN)
    }
}

impl RelationMatcher {
    pub fn new(max_distance: usize, min_fuzzy_len: usize) -> Self {
        Self {
            max_distance,
            min_fuzzy_len,
        }
    }

    /// Matches `desired` against `live`.
    ///
    /// An exact normalized match wins over any fuzzy one. Among fuzzy
    /// candidates the smallest distance wins, ties going to the earlier
    /// live entry.
    pub fn match_name(&self, desired: &str, live: &[LiveRelation]) -> MatchResult {
        let names: Vec<&str> = live.iter().map(|r| r.name.as_str()).collect();
        match self.closest(desired, &names) {
            Some((index, fuzzy)) => MatchResult::Reused {
                id: live[index].id.clone(),
                matched_name: live[index].name.clone(),
                fuzzy,
            },
            None => MatchResult::NotFound,
        }
    }

    /// Index of the candidate `desired` resolves to under the same rules as
    /// [`match_name`](Self::match_name), with the fuzzy annotation when the
    /// match was not exact.
    pub fn closest(
        &self,
        desired: &str,
        candidates: &[&str],
    ) -> Option<(usize, Option<FuzzyReuseWarning>)> {
        let key = normalize_name(desired);
        if key.is_empty() {
            return None;
        }

        let normalized: Vec<String> = candidates.iter().map(|c| normalize_name(c)).collect();
        if let Some(exact) = normalized.iter().position(|c| *c == key) {
            return Some((exact, None));
        }

        let key_len = key.chars().count();
        let mut best: Option<(usize, usize)> = None;
        for (index, candidate) in normalized.iter().enumerate() {
            if key_len.min(candidate.chars().count()) < self.min_fuzzy_len {
                continue;
            }
            let Some(distance) = levenshtein_with_max(&key, candidate, self.max_distance) else {
                continue;
            };
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        best.map(|(index, distance)| {
            let warning = FuzzyReuseWarning {
                desired: desired.to_string(),
                matched: candidates[index].to_string(),
                distance,
            };
            (index, Some(warning))
        })
    }
}

/// Levenshtein distance between `a` and `b`, or `None` once it is known to
/// exceed `max`.
pub fn levenshtein_with_max(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        return Some(a.len().max(b.len()));
    }

    // Two DP rows over `b`.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for j in 1..=b.len() {
            let cost = usize::from(*ca != b[j - 1]);
            let d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            curr[j] = d;
            row_min = row_min.min(d);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    (distance <= max).then_some(distance)
}
