//! Consensus resolution across classification signals.
//!
//! Votes are grouped by proposed type and weighted by source
//! reliability. The winner is the type with the highest total weight.
//! Effective confidence gets a small boost for unanimous agreement
//! among two or more independent voters and a discount for split
//! votes. A decision is accepted at a tier only when effective
//! confidence reaches the configured consensus threshold.

use serde::{Deserialize, Serialize};

use crate::taxonomy::FieldType;

/// Which signal produced a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOrigin {
    Pattern,
    CacheVerified,
    CacheUnverified,
    Embedding,
    ZeroShot,
}

/// One signal's proposal.
#[derive(Debug, Clone)]
pub struct Vote {
    pub field_type: FieldType,
    pub confidence: f32,
    pub origin: VoteOrigin,
}

/// Source reliability weights. Pattern matches outrank cache entries,
/// which outrank model signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWeights {
    pub pattern: f32,
    pub cache_verified: f32,
    pub cache_unverified: f32,
    pub embedding: f32,
    pub zero_shot: f32,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            pattern: 0.99,
            cache_verified: 0.95,
            cache_unverified: 0.85,
            embedding: 0.62,
            zero_shot: 0.60,
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, origin: VoteOrigin) -> f32 {
        match origin {
            VoteOrigin::Pattern => self.pattern,
            VoteOrigin::CacheVerified => self.cache_verified,
            VoteOrigin::CacheUnverified => self.cache_unverified,
            VoteOrigin::Embedding => self.embedding,
            VoteOrigin::ZeroShot => self.zero_shot,
        }
    }
}

/// How strongly the voters agreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementKind {
    /// Every vote proposed the winning type.
    All,
    /// The winner holds more than half the votes.
    Majority,
    /// No type holds more than half the votes.
    Split,
}

/// Outcome of a consensus round.
#[derive(Debug, Clone)]
pub struct ConsensusDecision {
    pub field_type: FieldType,
    pub effective_confidence: f32,
    pub agreement: AgreementKind,
    pub votes_for: usize,
    pub votes_total: usize,
}

impl ConsensusDecision {
    pub fn accepted(&self, threshold: f32) -> bool {
        self.effective_confidence >= threshold
    }
}

const UNANIMITY_BOOST: f32 = 0.05;
const SPLIT_DISCOUNT: f32 = 0.80;

/// Resolve a set of votes. Returns `None` when there are no votes.
pub fn resolve(votes: &[Vote], weights: &SourceWeights) -> Option<ConsensusDecision> {
    if votes.is_empty() {
        return None;
    }

    // Total reliability-weighted confidence per proposed type.
    let mut tallies: Vec<(FieldType, f32, usize)> = Vec::new();
    for vote in votes {
        let w = weights.weight(vote.origin) * vote.confidence;
        match tallies.iter_mut().find(|(t, _, _)| *t == vote.field_type) {
            Some((_, total, count)) => {
                *total += w;
                *count += 1;
            }
            None => tallies.push((vote.field_type, w, 1)),
        }
    }

    let (winner, winner_weight, votes_for) = tallies
        .iter()
        .copied()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let votes_total = votes.len();
    let agreement = if votes_for == votes_total {
        AgreementKind::All
    } else if votes_for * 2 > votes_total {
        AgreementKind::Majority
    } else {
        AgreementKind::Split
    };

    // Base confidence: weighted mean over the winning votes.
    let winner_weight_capacity: f32 = votes
        .iter()
        .filter(|v| v.field_type == winner)
        .map(|v| weights.weight(v.origin))
        .sum();
    let mut effective = if winner_weight_capacity > f32::EPSILON {
        winner_weight / winner_weight_capacity
    } else {
        0.0
    };

    match agreement {
        AgreementKind::All if votes_for >= 2 => {
            effective = (effective + UNANIMITY_BOOST).min(1.0);
        }
        AgreementKind::Split => {
            effective *= SPLIT_DISCOUNT;
        }
        _ => {}
    }

    Some(ConsensusDecision {
        field_type: winner,
        effective_confidence: effective,
        agreement,
        votes_for,
        votes_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(field_type: FieldType, confidence: f32, origin: VoteOrigin) -> Vote {
        Vote {
            field_type,
            confidence,
            origin,
        }
    }

    #[test]
    fn test_no_votes_no_decision() {
        assert!(resolve(&[], &SourceWeights::default()).is_none());
    }

    #[test]
    fn test_unanimous_two_voters_boosted_and_accepted() {
        let votes = vec![
            vote(FieldType::Email, 0.9, VoteOrigin::Embedding),
            vote(FieldType::Email, 0.9, VoteOrigin::ZeroShot),
        ];
        let d = resolve(&votes, &SourceWeights::default()).unwrap();
        assert_eq!(d.field_type, FieldType::Email);
        assert_eq!(d.agreement, AgreementKind::All);
        assert!(d.effective_confidence > 0.9);
        assert!(d.accepted(0.85));
    }

    #[test]
    fn test_single_weak_vote_not_accepted() {
        let votes = vec![vote(FieldType::Email, 0.5, VoteOrigin::ZeroShot)];
        let d = resolve(&votes, &SourceWeights::default()).unwrap();
        // One lone vote gets no unanimity boost and must not clear
        // the default threshold.
        assert!(!d.accepted(0.85));
    }

    #[test]
    fn test_two_vote_split_never_accepted() {
        let votes = vec![
            vote(FieldType::Email, 0.9, VoteOrigin::Embedding),
            vote(FieldType::Phone, 0.9, VoteOrigin::ZeroShot),
        ];
        let d = resolve(&votes, &SourceWeights::default()).unwrap();
        assert_eq!(d.agreement, AgreementKind::Split);
        assert!(!d.accepted(0.85));
    }

    #[test]
    fn test_majority_wins_over_higher_single_weight() {
        let votes = vec![
            vote(FieldType::Email, 0.9, VoteOrigin::Embedding),
            vote(FieldType::Email, 0.9, VoteOrigin::ZeroShot),
            vote(FieldType::Phone, 0.9, VoteOrigin::CacheUnverified),
        ];
        let d = resolve(&votes, &SourceWeights::default()).unwrap();
        assert_eq!(d.field_type, FieldType::Email);
        assert_eq!(d.agreement, AgreementKind::Majority);
        assert_eq!(d.votes_for, 2);
        assert_eq!(d.votes_total, 3);
    }

    #[test]
    fn test_pattern_outweighs_model_signals() {
        let votes = vec![
            vote(FieldType::School, 1.0, VoteOrigin::Pattern),
            vote(FieldType::FieldOfStudy, 0.9, VoteOrigin::ZeroShot),
        ];
        let d = resolve(&votes, &SourceWeights::default()).unwrap();
        assert_eq!(d.field_type, FieldType::School);
    }
}
