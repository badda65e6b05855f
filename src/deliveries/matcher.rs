//! Fuzzy recipient matching. The validator hands the full candidate list and
//! the claimed inputs to a [`RecipientMatcher`]; a hosted model plugs in
//! behind the same trait. [`LexicalMatcher`] is the shipped implementation:
//! a deterministic scorer applying the same rubric the hosted agent is
//! prompted with (exact or near-exact ~90-100, probable ~70-89, possible
//! ~50-69, below that no confident match).

use serde::{Deserialize, Serialize};

use crate::directory::{normalize_name, normalize_postal_code, UnitId};

/// One directory row as presented to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub unit_id: UnitId,
    pub occupant_name: String,
    /// Digits-only postal code; empty for apartments.
    pub postal_code: String,
    pub address: String,
}

/// Verdict returned by the matching collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyMatchReport {
    pub matched: bool,
    /// 0-100.
    pub confidence: u8,
    pub matched_unit: Option<UnitId>,
    pub reason: String,
    pub suggestions: Vec<MatchSuggestion>,
}

impl FuzzyMatchReport {
    pub fn unresolved(reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            confidence: 0,
            matched_unit: None,
            reason: reason.into(),
            suggestions: Vec::new(),
        }
    }
}

/// Alternative match surfaced when confidence stays below the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub occupant_name: String,
    pub address: String,
    pub unit_id: UnitId,
    /// 0-100.
    pub similarity: u8,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("matcher unavailable: {0}")]
    Unavailable(String),
    #[error("matcher returned malformed output: {0}")]
    Malformed(String),
}

/// External fuzzy-match capability.
pub trait RecipientMatcher: Send + Sync {
    fn assess(
        &self,
        claimed_name: &str,
        reference: &str,
        candidates: &[MatchCandidate],
    ) -> Result<FuzzyMatchReport, MatcherError>;
}

const MATCH_THRESHOLD: u8 = 70;
const SUGGESTION_FLOOR: u8 = 40;
const MAX_SUGGESTIONS: usize = 3;

/// Deterministic token/edit-distance matcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalMatcher;

impl RecipientMatcher for LexicalMatcher {
    fn assess(
        &self,
        claimed_name: &str,
        reference: &str,
        candidates: &[MatchCandidate],
    ) -> Result<FuzzyMatchReport, MatcherError> {
        if candidates.is_empty() {
            return Ok(FuzzyMatchReport::unresolved("no occupants registered"));
        }

        let claimed = normalize_name(claimed_name);
        if claimed.is_empty() {
            return Err(MatcherError::Malformed("claimed name is empty".to_string()));
        }
        let reference_digits = normalize_postal_code(reference);

        let mut scored: Vec<(u8, &MatchCandidate, String)> = candidates
            .iter()
            .map(|candidate| {
                let (score, reason) = score_candidate(&claimed, &reference_digits, candidate);
                (score, candidate, reason)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let (best_score, best, best_reason) = {
            let (score, candidate, reason) = &scored[0];
            (*score, (*candidate).clone(), reason.clone())
        };

        if best_score >= MATCH_THRESHOLD {
            return Ok(FuzzyMatchReport {
                matched: true,
                confidence: best_score,
                matched_unit: Some(best.unit_id),
                reason: best_reason,
                suggestions: Vec::new(),
            });
        }

        let suggestions = scored
            .into_iter()
            .filter(|(score, _, _)| *score >= SUGGESTION_FLOOR)
            .take(MAX_SUGGESTIONS)
            .map(|(score, candidate, reason)| MatchSuggestion {
                occupant_name: candidate.occupant_name.clone(),
                address: candidate.address.clone(),
                unit_id: candidate.unit_id.clone(),
                similarity: score,
                reason,
            })
            .collect();

        Ok(FuzzyMatchReport {
            matched: false,
            confidence: best_score,
            matched_unit: None,
            reason: "no candidate reached the confidence threshold".to_string(),
            suggestions,
        })
    }
}

fn score_candidate(
    claimed: &str,
    reference_digits: &str,
    candidate: &MatchCandidate,
) -> (u8, String) {
    let registered = normalize_name(&candidate.occupant_name);

    let (name_score, mut reason) = if registered == claimed {
        (95u8, "exact name match".to_string())
    } else if tokens_contained(claimed, &registered) || tokens_contained(&registered, claimed) {
        (80, "partial name match".to_string())
    } else {
        let similarity = edit_similarity(claimed, &registered);
        (
            (similarity * 0.75) as u8,
            format!("name similarity {:.0}%", similarity),
        )
    };

    let mut score = name_score;
    if !reference_digits.is_empty() && !candidate.postal_code.is_empty() {
        if candidate.postal_code == reference_digits {
            score = score.saturating_add(5).min(100);
            reason.push_str(", postal code agrees");
        } else {
            score = score.saturating_sub(30);
            reason.push_str(", postal code differs");
        }
    }

    (score, reason)
}

/// True when every whitespace token of `needle` appears among the tokens of
/// `haystack` (covers partial names and inverted ordering).
fn tokens_contained(needle: &str, haystack: &str) -> bool {
    let haystack_tokens: Vec<&str> = haystack.split_whitespace().collect();
    let mut needle_tokens = needle.split_whitespace().peekable();
    if needle_tokens.peek().is_none() {
        return false;
    }
    needle_tokens.all(|token| haystack_tokens.contains(&token))
}

/// Percentage similarity from edit distance over the longer string.
fn edit_similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let distance = edit_distance(a, b);
    100.0 * (1.0 - distance as f32 / longest as f32)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str, postal: &str) -> MatchCandidate {
        MatchCandidate {
            unit_id: UnitId(id.to_string()),
            occupant_name: name.to_string(),
            postal_code: normalize_postal_code(postal),
            address: format!("{name} address"),
        }
    }

    #[test]
    fn exact_name_and_postal_clears_threshold() {
        let candidates = vec![
            candidate("u-1", "Maria Silva", "12345-678"),
            candidate("u-2", "Carlos Souza", "99999-000"),
        ];
        let report = LexicalMatcher
            .assess("maria silva", "12345678", &candidates)
            .expect("matcher runs");
        assert!(report.matched);
        assert!(report.confidence >= 90);
        assert_eq!(report.matched_unit, Some(UnitId("u-1".to_string())));
    }

    #[test]
    fn partial_name_still_matches() {
        let candidates = vec![candidate("u-1", "Joao da Silva", "12345678")];
        let report = LexicalMatcher
            .assess("joao silva", "12345678", &candidates)
            .expect("matcher runs");
        assert!(report.matched, "tokens of the claim all appear: {report:?}");
    }

    #[test]
    fn postal_disagreement_drags_score_below_threshold() {
        let candidates = vec![candidate("u-1", "Maria Silva", "00000-000")];
        let report = LexicalMatcher
            .assess("Maria Silva", "12345-678", &candidates)
            .expect("matcher runs");
        assert!(!report.matched);
        assert!(report.confidence < MATCH_THRESHOLD);
        assert!(report.confidence >= SUGGESTION_FLOOR);
        assert_eq!(report.suggestions.len(), 1);
    }

    #[test]
    fn close_typo_with_agreeing_postal_clears_threshold() {
        // One-letter typo plus the right postal code is a probable match.
        let candidates = vec![candidate("u-1", "Mario Silva", "12345678")];
        let report = LexicalMatcher
            .assess("Maria Silva", "12345678", &candidates)
            .expect("matcher runs");
        assert!(report.matched);
        assert!(report.confidence >= MATCH_THRESHOLD && report.confidence < 90);
    }

    #[test]
    fn distant_name_yields_suggestions_not_match() {
        let candidates = vec![
            candidate("u-1", "Mario Silva", "12345678"),
            candidate("u-2", "Antonia Pereira", "12345678"),
        ];
        let report = LexicalMatcher
            .assess("Maria Santos", "12345678", &candidates)
            .expect("matcher runs");
        assert!(!report.matched);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.occupant_name == "Mario Silva"));
    }

    #[test]
    fn empty_directory_is_unresolved() {
        let report = LexicalMatcher
            .assess("Maria Silva", "12345678", &[])
            .expect("matcher runs");
        assert!(!report.matched);
        assert_eq!(report.confidence, 0);
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("maria", "maria"), 0);
        assert_eq!(edit_distance("maria", "mario"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
