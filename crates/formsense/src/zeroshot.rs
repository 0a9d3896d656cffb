//! Zero-shot scoring of field context against type descriptions.
//!
//! The candidate label set is the closed list of taxonomy
//! descriptions, optionally narrowed by input modality. Scores are
//! sum-normalized over the candidate set. Deterministic: token
//! overlap between the field context and each type's description and
//! canonical phrasings, no model download, no network.

use std::collections::HashSet;

use crate::field::tokenize;
use crate::taxonomy::FieldType;

/// Ranks candidate types for a piece of field context.
pub trait ZeroShot: Send + Sync {
    /// Returns candidates ranked best-first with sum-normalized
    /// scores. An empty result means no candidate scored at all.
    fn classify(&self, text: &str, candidates: &[FieldType]) -> Vec<(FieldType, f32)>;
}

/// Token-overlap scorer over taxonomy descriptions and phrasings.
pub struct KeywordZeroShot;

impl KeywordZeroShot {
    pub fn new() -> Self {
        Self
    }

    fn score_candidate(context: &HashSet<String>, candidate: FieldType) -> f32 {
        let mut best = 0.0f32;
        let mut texts: Vec<&str> = vec![candidate.description()];
        texts.extend_from_slice(candidate.phrasings());

        for text in texts {
            let tokens: Vec<String> = tokenize(text)
                .into_iter()
                .filter(|t| !is_stopword(t))
                .collect();
            if tokens.is_empty() {
                continue;
            }
            let hits = tokens.iter().filter(|t| context.contains(*t)).count();
            let score = hits as f32 / tokens.len() as f32;
            if score > best {
                best = score;
            }
        }
        best
    }
}

impl ZeroShot for KeywordZeroShot {
    fn classify(&self, text: &str, candidates: &[FieldType]) -> Vec<(FieldType, f32)> {
        let context: HashSet<String> = tokenize(text)
            .into_iter()
            .filter(|t| !is_stopword(t))
            .collect();
        if context.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(FieldType, f32)> = candidates
            .iter()
            .map(|c| (*c, Self::score_candidate(&context, *c)))
            .filter(|(_, s)| *s > 0.0)
            .collect();

        let total: f32 = scored.iter().map(|(_, s)| s).sum();
        if total > f32::EPSILON {
            for (_, s) in &mut scored {
                *s /= total;
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}

impl Default for KeywordZeroShot {
    fn default() -> Self {
        Self::new()
    }
}

fn is_stopword(token: &str) -> bool {
    matches!(
        token,
        "the" | "of" | "to" | "in" | "is" | "a" | "an" | "or" | "and" | "you" | "your"
            | "applicant" | "applicants" | "are" | "do" | "does" | "for" | "what" | "this"
            | "that" | "with" | "will" | "be" | "s"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sponsorship_question_ranks_sponsorship_first() {
        let zs = KeywordZeroShot::new();
        let ranked = zs.classify(
            "Will you now or in the future require visa sponsorship?",
            FieldType::ALL,
        );
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].0, FieldType::VisaSponsorship);
    }

    #[test]
    fn test_scores_sum_normalized() {
        let zs = KeywordZeroShot::new();
        let ranked = zs.classify("What is your current visa status?", FieldType::ALL);
        let total: f32 = ranked.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_context_yields_nothing() {
        let zs = KeywordZeroShot::new();
        assert!(zs.classify("", FieldType::ALL).is_empty());
        assert!(zs.classify("the of a", FieldType::ALL).is_empty());
    }

    #[test]
    fn test_candidates_restricted() {
        let zs = KeywordZeroShot::new();
        let ranked = zs.classify(
            "Are you willing to relocate?",
            &[FieldType::Relocation, FieldType::RemoteWork],
        );
        assert_eq!(ranked[0].0, FieldType::Relocation);
        for (t, _) in &ranked {
            assert!(matches!(t, FieldType::Relocation | FieldType::RemoteWork));
        }
    }
}
