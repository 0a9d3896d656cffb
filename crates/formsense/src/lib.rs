//! Trust-cascade form field classifier.
//!
//! Classifies job-application form fields into a closed taxonomy
//! through tiers of increasing cost: deterministic patterns and
//! caches first, cheap fuzzy-signal consensus second, a full LLM
//! classification last. Every paid resolution feeds the caches so
//! the same question gets cheaper over time, with learned
//! associations gated behind validation and a human review queue.

pub mod answers;
pub mod bank;
pub mod cache;
pub mod cascade;
pub mod classify;
pub mod config;
pub mod consensus;
pub mod embedding;
pub mod error;
pub mod field;
pub mod guard;
pub mod oracle;
pub mod paths;
pub mod patterns;
pub mod review;
pub mod taxonomy;
pub mod zeroshot;

pub use answers::{AnswerResolver, Profile, ResolvedField};
pub use cascade::TrustCascade;
pub use classify::{Classification, ClassificationSource};
pub use config::ClassifierConfig;
pub use error::ClassifyError;
pub use field::{FieldDescriptor, InputModality, PageHint};
pub use taxonomy::FieldType;
