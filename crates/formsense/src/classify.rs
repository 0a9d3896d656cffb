//! Classification output types.

use serde::{Deserialize, Serialize};

use crate::taxonomy::FieldType;

/// Which tier or signal produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Exact-cache hit on the normalized question text.
    Tier1ExactCache,
    /// Deterministic pattern match on the stable identifier.
    Tier1FieldId,
    /// Deterministic pattern match on label or options.
    Tier1Pattern,
    /// Hierarchical cache hit.
    Tier1Cache,
    /// Question-bank similarity match, oracle-verified.
    Tier2Embedding,
    /// Signal consensus, oracle-verified.
    Tier2Consensus,
    /// Full oracle classification.
    Tier3Llm,
    /// Direct-answer fallback after an ambiguous taxonomy response.
    Tier3DirectAnswer,
    /// Guard re-derivation after a modality mismatch.
    GuardRederived,
    /// Classification failed; do not fill.
    Unresolved,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tier1ExactCache => "tier1_exact_cache",
            Self::Tier1FieldId => "tier1_field_id",
            Self::Tier1Pattern => "tier1_pattern",
            Self::Tier1Cache => "tier1_cache",
            Self::Tier2Embedding => "tier2_embedding",
            Self::Tier2Consensus => "tier2_consensus",
            Self::Tier3Llm => "tier3_llm",
            Self::Tier3DirectAnswer => "tier3_direct_answer",
            Self::GuardRederived => "guard_rederived",
            Self::Unresolved => "unresolved",
        }
    }
}

/// One classification of one field in one run. Not persisted
/// directly; only the (context -> type) association is, via the
/// cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub field_type: FieldType,
    pub confidence: f32,
    pub source: ClassificationSource,
    pub verified: bool,
}

impl Classification {
    pub fn new(
        field_type: FieldType,
        confidence: f32,
        source: ClassificationSource,
        verified: bool,
    ) -> Self {
        Self {
            field_type,
            confidence,
            source,
            verified,
        }
    }

    /// Terminal failure marker: unknown type, zero confidence.
    pub fn unresolved() -> Self {
        Self::new(FieldType::Unknown, 0.0, ClassificationSource::Unresolved, false)
    }

    pub fn is_resolved(&self) -> bool {
        self.field_type != FieldType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_marker() {
        let c = Classification::unresolved();
        assert!(!c.is_resolved());
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.source.as_str(), "unresolved");
    }

    #[test]
    fn test_source_tokens() {
        assert_eq!(ClassificationSource::Tier1FieldId.as_str(), "tier1_field_id");
        assert_eq!(ClassificationSource::Tier1ExactCache.as_str(), "tier1_exact_cache");
    }
}
