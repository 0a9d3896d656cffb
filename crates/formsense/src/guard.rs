//! Post-classification modality guard.
//!
//! A boolean-flavored type on a free-text field means a "Yes"/"No"
//! answer would be typed into a box expecting prose, usually a
//! conditional follow-up ("please explain your visa status"). The
//! guard re-derives a free-text-compatible type: first via one
//! low-cost oracle call constrained to non-boolean types, then via
//! keyword heuristics on the label, and as a last resort a safe inert
//! type. It never lets the original boolean guess through.

use tracing::{debug, warn};

use crate::classify::{Classification, ClassificationSource};
use crate::error::ClassifyError;
use crate::field::{tokenize, FieldDescriptor};
use crate::oracle::{Oracle, TaxonomyVerdict};
use crate::taxonomy::FieldType;

/// What the guard did with a classification.
#[derive(Debug, Clone)]
pub enum GuardOutcome {
    /// Type and modality are compatible; classification untouched.
    Unchanged(Classification),
    /// Re-derived to a free-text-compatible type. The correction is
    /// queued for learning so the mistake is not repeated.
    Rederived(Classification),
    /// No safe re-derivation found; inert type substituted.
    Blocked(Classification),
}

impl GuardOutcome {
    pub fn classification(&self) -> &Classification {
        match self {
            Self::Unchanged(c) | Self::Rederived(c) | Self::Blocked(c) => c,
        }
    }
}

/// Safety layer between classification and answer resolution.
pub struct ModalityGuard;

impl ModalityGuard {
    /// Check a classification against the field's input modality.
    /// `oracle` is optional; without one the guard goes straight to
    /// keyword heuristics.
    pub fn apply(
        field: &FieldDescriptor,
        classification: Classification,
        oracle: Option<&dyn Oracle>,
    ) -> GuardOutcome {
        if !classification.field_type.is_boolean_flavored() || !field.modality.is_free_text() {
            return GuardOutcome::Unchanged(classification);
        }

        debug!(
            proposed = %classification.field_type,
            label = %field.label,
            "boolean type on free-text field, re-deriving"
        );

        match Self::rederive(field, classification.field_type, oracle) {
            Ok((rederived, confidence)) => GuardOutcome::Rederived(Classification::new(
                rederived,
                confidence,
                ClassificationSource::GuardRederived,
                false,
            )),
            Err(e) => {
                warn!(label = %field.label, "{e}; substituting inert type");
                GuardOutcome::Blocked(Classification::new(
                    FieldType::Explanation,
                    0.30,
                    ClassificationSource::GuardRederived,
                    false,
                ))
            }
        }
    }

    /// Find a free-text-compatible replacement type with its
    /// confidence, or fail with the blocked-guard error.
    fn rederive(
        field: &FieldDescriptor,
        proposed: FieldType,
        oracle: Option<&dyn Oracle>,
    ) -> Result<(FieldType, f32), ClassifyError> {
        if let Some(oracle) = oracle {
            if let Some(rederived) = Self::rederive_via_oracle(field, oracle) {
                return Ok((rederived, 0.70));
            }
        }
        if let Some(rederived) = Self::keyword_fallback(field) {
            return Ok((rederived, 0.60));
        }
        Err(ClassifyError::GuardBlocked {
            proposed: proposed.as_str().to_string(),
        })
    }

    /// One constrained oracle call over the non-boolean types.
    fn rederive_via_oracle(field: &FieldDescriptor, oracle: &dyn Oracle) -> Option<FieldType> {
        let candidates: Vec<FieldType> = FieldType::ALL
            .iter()
            .copied()
            .filter(|t| !t.is_boolean_flavored())
            .collect();

        let mut evidence = field.context_text();
        if let Some(prior) = field.trailing_prior_answer() {
            evidence.push_str(&format!(
                "\nThe label ends with a recorded prior answer ({prior}); \
                 this is a free-text follow-up to that answer."
            ));
        }

        match oracle.classify(&evidence, &candidates, None) {
            Ok(TaxonomyVerdict::Type(t)) if !t.is_boolean_flavored() => Some(t),
            Ok(_) => None,
            Err(e) => {
                debug!("guard oracle re-derivation unavailable: {e}");
                None
            }
        }
    }

    /// Keyword heuristics over the label when the oracle is missing
    /// or unhelpful.
    fn keyword_fallback(field: &FieldDescriptor) -> Option<FieldType> {
        let tokens = tokenize(&field.context_text());
        let has = |kw: &[&str]| tokens.iter().any(|t| kw.contains(&t.as_str()));

        if has(&["citizenship", "citizen", "nationality"]) {
            return Some(FieldType::CitizenshipCountry);
        }
        if has(&["visa", "sponsorship", "sponsor", "authorized", "authorization", "immigration", "status"]) {
            return Some(FieldType::VisaStatus);
        }
        if has(&["explain", "describe", "details", "elaborate", "why"]) {
            return Some(FieldType::Explanation);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::InputModality;
    use crate::oracle::{OracleError, ScriptedOracle};

    fn boolean_classification() -> Classification {
        Classification::new(
            FieldType::WorkAuthorization,
            0.9,
            ClassificationSource::Tier1Pattern,
            true,
        )
    }

    #[test]
    fn test_compatible_modality_untouched() {
        let field = FieldDescriptor::new("Authorized to work?", InputModality::Radio);
        let outcome = ModalityGuard::apply(&field, boolean_classification(), None);
        assert!(matches!(outcome, GuardOutcome::Unchanged(_)));
    }

    #[test]
    fn test_boolean_on_textarea_rederived_by_keywords() {
        // Scenario: "Are you authorized to work? *No" on a textarea.
        let field = FieldDescriptor::new(
            "Are you authorized to work? *No",
            InputModality::Textarea,
        );
        let outcome = ModalityGuard::apply(&field, boolean_classification(), None);
        match outcome {
            GuardOutcome::Rederived(c) => {
                assert_eq!(c.field_type, FieldType::VisaStatus);
                assert_eq!(c.source, ClassificationSource::GuardRederived);
                assert!(!c.field_type.is_boolean_flavored());
            }
            other => panic!("expected re-derivation, got {other:?}"),
        }
    }

    #[test]
    fn test_oracle_rederivation_preferred() {
        let oracle = ScriptedOracle::new()
            .with_classify(Ok(TaxonomyVerdict::Type(FieldType::CitizenshipCountry)));
        let field = FieldDescriptor::new(
            "Are you authorized to work? *No",
            InputModality::Textarea,
        );
        let outcome = ModalityGuard::apply(&field, boolean_classification(), Some(&oracle));
        match outcome {
            GuardOutcome::Rederived(c) => {
                assert_eq!(c.field_type, FieldType::CitizenshipCountry);
            }
            other => panic!("expected re-derivation, got {other:?}"),
        }
        assert_eq!(oracle.classify_calls(), 1);
    }

    #[test]
    fn test_oracle_failure_falls_back_to_keywords() {
        let oracle =
            ScriptedOracle::new().with_classify(Err(OracleError::Timeout(30)));
        let field = FieldDescriptor::new("Current visa status *Yes", InputModality::Text);
        let outcome = ModalityGuard::apply(&field, boolean_classification(), Some(&oracle));
        match outcome {
            GuardOutcome::Rederived(c) => assert_eq!(c.field_type, FieldType::VisaStatus),
            other => panic!("expected re-derivation, got {other:?}"),
        }
    }

    #[test]
    fn test_no_heuristic_yields_inert_type() {
        let field = FieldDescriptor::new("Additional comments *Yes", InputModality::Textarea);
        let outcome = ModalityGuard::apply(&field, boolean_classification(), None);
        match outcome {
            GuardOutcome::Blocked(c) => {
                assert_eq!(c.field_type, FieldType::Explanation);
                assert!(!c.field_type.is_boolean_flavored());
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_blocked_rederivation_reports_guard_error() {
        let field = FieldDescriptor::new("Additional comments *Yes", InputModality::Textarea);
        let err = ModalityGuard::rederive(&field, FieldType::WorkAuthorization, None)
            .expect_err("no heuristic applies to this label");
        match err {
            ClassifyError::GuardBlocked { proposed } => {
                assert_eq!(proposed, "work_authorization");
            }
            other => panic!("expected GuardBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_boolean_never_survives_free_text() {
        // Property: for every boolean type on every free-text
        // modality, the final type is never boolean-flavored.
        for t in FieldType::ALL.iter().filter(|t| t.is_boolean_flavored()) {
            for modality in [InputModality::Text, InputModality::Textarea] {
                let field = FieldDescriptor::new("Anything at all", modality);
                let c = Classification::new(*t, 0.99, ClassificationSource::Tier3Llm, true);
                let outcome = ModalityGuard::apply(&field, c, None);
                assert!(
                    !outcome.classification().field_type.is_boolean_flavored(),
                    "boolean type {t} survived a free-text field"
                );
            }
        }
    }
}
