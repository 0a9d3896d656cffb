//! Error taxonomy for the classification pipeline.
//!
//! Signal-level problems (a matcher not loaded, an oracle timeout) are
//! never fatal for a run: the cascade treats them as tier misses and
//! keeps going. Only store construction can fail hard.

use thiserror::Error;

/// Errors surfaced by classifiers, signal adapters and stores.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A matcher or model backend is not loaded or reachable.
    /// Treated as "no vote" by the cascade, never fatal.
    #[error("signal unavailable: {0}")]
    SignalUnavailable(String),

    /// Network or timeout failure talking to the oracle.
    /// The cascade escalates to the next tier instead of retrying.
    #[error("oracle transport failure: {0}")]
    OracleTransport(String),

    /// The oracle returned a type token outside the known taxonomy.
    #[error("oracle returned out-of-taxonomy token: {0:?}")]
    AmbiguousTaxonomy(String),

    /// A learned association failed pre-persistence validation.
    /// The association may still be used for the current run.
    #[error("learning rejected: {0}")]
    ValidationRejected(String),

    /// A boolean-flavored type was proposed for an incompatible
    /// modality and no safe re-derivation was found.
    #[error("guard blocked type {proposed} on free-text field")]
    GuardBlocked { proposed: String },

    /// Store I/O failure. Persistence degrades to memory-only.
    #[error("store i/o: {0}")]
    Store(#[from] std::io::Error),
}

impl From<crate::oracle::OracleError> for ClassifyError {
    fn from(e: crate::oracle::OracleError) -> Self {
        ClassifyError::OracleTransport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;

    #[test]
    fn test_oracle_error_maps_to_transport() {
        let err = ClassifyError::from(OracleError::Timeout(30));
        assert!(matches!(err, ClassifyError::OracleTransport(_)));
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_error_display() {
        let err = ClassifyError::SignalUnavailable("embedder offline".to_string());
        assert!(err.to_string().contains("embedder offline"));

        let err = ClassifyError::GuardBlocked {
            proposed: "visa_sponsorship".to_string(),
        };
        assert!(err.to_string().contains("visa_sponsorship"));
    }
}
