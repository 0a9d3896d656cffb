//! The trust cascade.
//!
//! Three tiers, cheapest first. Tier 1 is deterministic and free:
//! exact question cache, identifier patterns, label/option patterns,
//! verified cache hits. Tier 2 builds a consensus from cheap fuzzy
//! signals (question bank, centroid embedding, zero-shot, session
//! hints, unverified cache hits) and spends exactly one cheap oracle
//! verification on the winner. Tier 3 spends one full oracle
//! classification. Anything still unresolved is reported as such; the
//! cascade never guesses.
//!
//! Every resolution at tier 2 or 3 produces a learning event so the
//! same question gets cheaper over time. Learned associations go
//! through the validation gate and, unless bootstrap auto-verify is
//! on, through the human review queue.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::answers::{AnswerResolver, Profile, ResolvedField};
use crate::bank::QuestionBank;
use crate::cache::{validate_before_learning, CacheStats, CacheStore, ExactCache, LearnOutcome};
use crate::classify::{Classification, ClassificationSource};
use crate::config::ClassifierConfig;
use crate::consensus::{self, Vote, VoteOrigin};
use crate::embedding::{CentroidIndex, Embedder, OllamaEmbedder};
use crate::error::ClassifyError;
use crate::field::{FieldDescriptor, PageHint};
use crate::guard::{GuardOutcome, ModalityGuard};
use crate::oracle::{HttpOracle, Oracle, TaxonomyVerdict};
use crate::patterns::PatternMatcher;
use crate::paths;
use crate::review::{ReviewEvidence, ReviewQueue};
use crate::taxonomy::FieldType;
use crate::zeroshot::{KeywordZeroShot, ZeroShot};

/// How a tier run ended, before the guard pass.
enum TierOutcome {
    Resolved(Classification),
    /// The oracle answered outside the taxonomy. A direct answer may
    /// still be possible.
    Ambiguous,
    Unresolved,
}

/// Tiered field classifier with learning.
pub struct TrustCascade {
    config: ClassifierConfig,
    patterns: PatternMatcher,
    cache: CacheStore,
    exact: ExactCache,
    bank: QuestionBank,
    review: ReviewQueue,
    embedder: Option<Arc<dyn Embedder>>,
    centroids: Option<CentroidIndex>,
    zero_shot: Box<dyn ZeroShot>,
    oracle: Option<Arc<dyn Oracle>>,
    resolver: AnswerResolver,
}

impl TrustCascade {
    /// Load stores from the configured data directory, connect the
    /// configured backends and merge the review queue. Backend
    /// failures degrade the corresponding signal instead of aborting.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let dir = config.data_dir();
        let cache = CacheStore::load(&paths::cache_store_path(&dir))?;
        let exact = ExactCache::load(&paths::exact_cache_path(&dir))?;
        let bank = QuestionBank::load(&paths::question_bank_path(&dir))?;
        let review = ReviewQueue::load(&paths::review_queue_path(&dir))?;

        let mut cascade = Self {
            patterns: PatternMatcher::new(),
            cache,
            exact,
            bank,
            review,
            embedder: None,
            centroids: None,
            zero_shot: Box::new(KeywordZeroShot::new()),
            oracle: None,
            resolver: AnswerResolver::new()?,
            config,
        };

        if cascade.config.embedding.enabled {
            match OllamaEmbedder::new(cascade.config.embedding.clone()) {
                Ok(embedder) => {
                    if let Err(e) = cascade.set_embedder(Arc::new(embedder)) {
                        warn!("embedding signal unavailable: {e}");
                    }
                }
                Err(e) => warn!("embedding signal unavailable: {e}"),
            }
        }
        if cascade.config.oracle.enabled {
            match HttpOracle::new(cascade.config.oracle.clone()) {
                Ok(oracle) => cascade.oracle = Some(Arc::new(oracle)),
                Err(e) => warn!("oracle unavailable: {e}"),
            }
        }

        cascade.merge_reviews();
        Ok(cascade)
    }

    /// Cascade with in-memory stores and no backends. Used by tests
    /// and dry-run tooling; backends attach via the setters.
    pub fn in_memory(config: ClassifierConfig) -> Result<Self> {
        Ok(Self {
            patterns: PatternMatcher::new(),
            cache: CacheStore::in_memory(),
            exact: ExactCache::in_memory(),
            bank: QuestionBank::in_memory(),
            review: ReviewQueue::in_memory(),
            embedder: None,
            centroids: None,
            zero_shot: Box::new(KeywordZeroShot::new()),
            oracle: None,
            resolver: AnswerResolver::new()?,
            config,
        })
    }

    pub fn set_oracle(&mut self, oracle: Arc<dyn Oracle>) {
        self.oracle = Some(oracle);
    }

    /// Attach an embedder and build the centroid index from it.
    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) -> Result<(), ClassifyError> {
        self.centroids = Some(CentroidIndex::build(embedder.as_ref())?);
        self.embedder = Some(embedder);
        Ok(())
    }

    /// Startup merge of the review queue: approved items materialize
    /// into the cache and question bank, rejected items are dropped.
    pub fn merge_reviews(&mut self) {
        self.review
            .merge_into(&mut self.cache, &mut self.bank, self.embedder.as_deref());
    }

    /// Persist every durable store.
    pub fn flush(&mut self) {
        self.cache.flush();
        self.exact.flush();
        self.bank.flush();
        self.review.flush();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn review(&self) -> &ReviewQueue {
        &self.review
    }

    pub fn review_mut(&mut self) -> &mut ReviewQueue {
        &mut self.review
    }

    /// Classify one field. Never guesses: a field no tier can resolve
    /// comes back as `Unknown` with zero confidence.
    pub fn classify(&mut self, field: &FieldDescriptor, page: Option<&PageHint>) -> Classification {
        let (classification, _) = self.classify_inner(field, page);
        classification
    }

    /// Classify and resolve the answer from the profile. When the
    /// oracle answered outside the taxonomy, fall back to a single
    /// bounded direct-answer call instead of giving up.
    pub fn classify_and_resolve(
        &mut self,
        field: &FieldDescriptor,
        page: Option<&PageHint>,
        profile: &Profile,
    ) -> ResolvedField {
        let (classification, ambiguous) = self.classify_inner(field, page);

        if classification.is_resolved() {
            let answer =
                self.resolver
                    .resolve(profile, classification.field_type, field.modality);
            return ResolvedField::from_classification(&classification, answer);
        }

        if ambiguous {
            if let Some(oracle) = self.oracle.clone() {
                match oracle.direct_answer(&question_text(field), &profile.to_json()) {
                    Ok(answer) => {
                        info!(label = %field.label, "resolved via direct answer");
                        let c = Classification::new(
                            FieldType::Unknown,
                            0.50,
                            ClassificationSource::Tier3DirectAnswer,
                            false,
                        );
                        return ResolvedField::from_classification(&c, Some(answer));
                    }
                    Err(e) => debug!("direct answer unavailable: {e}"),
                }
            }
        }

        ResolvedField::from_classification(&classification, None)
    }

    fn classify_inner(
        &mut self,
        field: &FieldDescriptor,
        page: Option<&PageHint>,
    ) -> (Classification, bool) {
        let outcome = self.run_tiers(field, page);
        match outcome {
            TierOutcome::Resolved(c) => (self.apply_guard(field, c), false),
            TierOutcome::Ambiguous => (Classification::unresolved(), true),
            TierOutcome::Unresolved => (Classification::unresolved(), false),
        }
    }

    fn run_tiers(&mut self, field: &FieldDescriptor, page: Option<&PageHint>) -> TierOutcome {
        // Tier 1: exact question cache.
        let question = question_text(field);
        if let Some(t) = self.exact.get(&question) {
            debug!(label = %field.label, %t, "tier-1 exact-cache hit");
            return TierOutcome::Resolved(Classification::new(
                t,
                1.0,
                ClassificationSource::Tier1ExactCache,
                true,
            ));
        }

        // Tier 1: stable identifier patterns.
        if let Some(id) = &field.id {
            if let Some(hit) = self.patterns.match_identifier(id) {
                debug!(label = %field.label, rule = hit.rule, "tier-1 identifier match");
                return TierOutcome::Resolved(Classification::new(
                    hit.field_type,
                    0.99,
                    ClassificationSource::Tier1FieldId,
                    true,
                ));
            }
        }

        // Tier 1: label and option patterns.
        let label_hit = self
            .patterns
            .match_label(&field.label)
            .or_else(|| self.patterns.match_options(&field.options));
        if let Some(hit) = label_hit {
            debug!(label = %field.label, rule = hit.rule, "tier-1 pattern match");
            return TierOutcome::Resolved(Classification::new(
                hit.field_type,
                0.97,
                ClassificationSource::Tier1Pattern,
                true,
            ));
        }

        // Tier 1: hierarchical cache. Verified hits resolve here;
        // unverified hits become a tier-2 vote instead.
        let mut unverified_vote: Option<Vote> = None;
        if let Some(hit) = self.cache.lookup(field) {
            if hit.verified {
                debug!(label = %field.label, level = ?hit.level, "tier-1 cache hit");
                return TierOutcome::Resolved(Classification::new(
                    hit.field_type,
                    self.config.weights.cache_verified,
                    ClassificationSource::Tier1Cache,
                    true,
                ));
            }
            unverified_vote = Some(Vote {
                field_type: hit.field_type,
                confidence: 0.90,
                origin: VoteOrigin::CacheUnverified,
            });
        }

        match self.tier2(field, &question, unverified_vote) {
            Some(outcome) => outcome,
            None => self.tier3(field, &question, page),
        }
    }

    /// Tier 2: consensus over cheap fuzzy signals, sealed with one
    /// cheap oracle verification. Returns `None` on a clean miss.
    fn tier2(
        &mut self,
        field: &FieldDescriptor,
        question: &str,
        unverified_vote: Option<Vote>,
    ) -> Option<TierOutcome> {
        let context = field.context_text();
        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&context) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("embedding unavailable for this field: {e}");
                    None
                }
            },
            None => None,
        };

        // Question bank nearest neighbor is the strongest tier-2
        // signal and short-circuits consensus.
        if let Some(embedding) = &embedding {
            if let Some(m) = self
                .bank
                .nearest(embedding, self.config.thresholds.bank_similarity)
            {
                debug!(
                    matched = %m.matched_text,
                    similarity = m.similarity,
                    "tier-2 question-bank match"
                );
                return self.verify_candidate(
                    field,
                    question,
                    m.field_type,
                    m.similarity,
                    ClassificationSource::Tier2Embedding,
                );
            }
        }

        let mut votes: Vec<Vote> = Vec::new();
        if let Some(vote) = unverified_vote {
            votes.push(vote);
        }

        if let Some(t) = self.review.session_hint(question) {
            votes.push(Vote {
                field_type: t,
                confidence: 0.90,
                origin: VoteOrigin::CacheUnverified,
            });
        }

        if let (Some(embedding), Some(centroids)) = (&embedding, &self.centroids) {
            if let Some((t, sim)) = centroids.best_match(embedding) {
                if sim >= self.config.thresholds.centroid_similarity {
                    votes.push(Vote {
                        field_type: t,
                        confidence: sim,
                        origin: VoteOrigin::Embedding,
                    });
                }
            }
        }

        let candidates = FieldType::candidates_for_modality(field.modality);
        let ranked = self.zero_shot.classify(&context, &candidates);
        let mut zero_shot_share = 0.0f32;
        if let Some((t, share)) = ranked.first().copied() {
            if share >= self.config.thresholds.zero_shot_standalone {
                zero_shot_share = share;
                let runner_up = ranked.get(1).map(|(_, s)| *s).unwrap_or(0.0);
                // Margin-based confidence: a dominant top candidate
                // is trusted more than a narrow lead.
                let margin = if share > f32::EPSILON {
                    (share - runner_up) / share
                } else {
                    0.0
                };
                votes.push(Vote {
                    field_type: t,
                    confidence: margin,
                    origin: VoteOrigin::ZeroShot,
                });
            }
        }

        // A lone zero-shot vote needs a much larger share of the
        // scoring mass before it is worth a verification call.
        if votes.len() == 1
            && votes[0].origin == VoteOrigin::ZeroShot
            && zero_shot_share < self.config.thresholds.zero_shot_solo
        {
            votes.clear();
        }

        let decision = consensus::resolve(&votes, &self.config.weights)?;
        if !decision.accepted(self.config.thresholds.consensus) {
            debug!(
                winner = %decision.field_type,
                confidence = decision.effective_confidence,
                "tier-2 consensus below threshold"
            );
            return None;
        }

        self.verify_candidate(
            field,
            question,
            decision.field_type,
            decision.effective_confidence,
            ClassificationSource::Tier2Consensus,
        )
    }

    /// Spend exactly one cheap verification on a tier-2 candidate.
    /// A "no" or a transport failure falls through to tier 3.
    fn verify_candidate(
        &mut self,
        field: &FieldDescriptor,
        question: &str,
        candidate: FieldType,
        confidence: f32,
        source: ClassificationSource,
    ) -> Option<TierOutcome> {
        let oracle = self.oracle.clone()?;
        let verified = oracle
            .verify(candidate.description(), &field.context_text())
            .map_err(ClassifyError::from);
        match verified {
            Ok(true) => {
                self.learn_verified(field, question, candidate, source.as_str());
                Some(TierOutcome::Resolved(Classification::new(
                    candidate, confidence, source, true,
                )))
            }
            Ok(false) => {
                debug!(%candidate, "tier-2 candidate rejected by verification");
                None
            }
            Err(e) => {
                debug!("verification unavailable: {e}");
                None
            }
        }
    }

    /// Tier 3: one full oracle classification with page context.
    fn tier3(&mut self, field: &FieldDescriptor, question: &str, page: Option<&PageHint>) -> TierOutcome {
        let Some(oracle) = self.oracle.clone() else {
            return TierOutcome::Unresolved;
        };

        let taxonomy = FieldType::candidates_for_modality(field.modality);
        match Self::oracle_classify(oracle.as_ref(), field, &taxonomy, page) {
            Ok(Some(t)) => {
                self.learn_unreviewed(field, question, t, "tier3");
                TierOutcome::Resolved(Classification::new(
                    t,
                    0.90,
                    ClassificationSource::Tier3Llm,
                    false,
                ))
            }
            Ok(None) => {
                debug!(label = %field.label, "oracle declined every taxonomy token");
                TierOutcome::Unresolved
            }
            Err(e @ ClassifyError::AmbiguousTaxonomy(_)) => {
                warn!(label = %field.label, "{e}");
                TierOutcome::Ambiguous
            }
            Err(e) => {
                warn!(label = %field.label, "oracle classification failed: {e}");
                TierOutcome::Unresolved
            }
        }
    }

    /// One classification call, with the verdict folded into the error
    /// taxonomy: an out-of-taxonomy token is an error, "none of the
    /// above" is a clean decline.
    fn oracle_classify(
        oracle: &dyn Oracle,
        field: &FieldDescriptor,
        taxonomy: &[FieldType],
        page: Option<&PageHint>,
    ) -> Result<Option<FieldType>, ClassifyError> {
        match oracle.classify(&field.context_text(), taxonomy, page)? {
            TaxonomyVerdict::Type(t) => Ok(Some(t)),
            TaxonomyVerdict::NoneOfTheAbove => Ok(None),
            TaxonomyVerdict::OutOfTaxonomy(token) => Err(ClassifyError::AmbiguousTaxonomy(token)),
        }
    }

    /// Persist a verified association: exact cache plus the learned
    /// cache level. Conflicts go to the review queue.
    fn learn_verified(
        &mut self,
        field: &FieldDescriptor,
        question: &str,
        field_type: FieldType,
        source: &str,
    ) {
        if let Err(e) = validate_before_learning(field, field_type) {
            debug!("association not persisted: {e}");
            return;
        }
        self.exact.insert(question, field_type);
        if let LearnOutcome::Conflict(existing) =
            self.cache.learn_pattern(field, field_type, source, true)
        {
            self.queue_conflict(field, field_type, existing, source);
        }
    }

    /// Handle a tier-3 learning event: straight to the verified cache
    /// in bootstrap mode, otherwise into the review queue.
    fn learn_unreviewed(
        &mut self,
        field: &FieldDescriptor,
        question: &str,
        field_type: FieldType,
        source: &str,
    ) {
        if let Err(e) = validate_before_learning(field, field_type) {
            debug!("association not persisted: {e}");
            return;
        }
        if self.config.auto_verify {
            self.exact.insert(question, field_type);
            if let LearnOutcome::Conflict(existing) =
                self.cache.learn_pattern(field, field_type, source, true)
            {
                self.queue_conflict(field, field_type, existing, source);
            }
            return;
        }
        // Usable for the rest of this run, pending for everything
        // after.
        self.cache.learn_session(field, field_type, source);
        self.review.push(field_type, evidence(field), None, source);
    }

    fn queue_conflict(
        &mut self,
        field: &FieldDescriptor,
        proposed: FieldType,
        existing: FieldType,
        source: &str,
    ) {
        info!(
            label = %field.label,
            %proposed,
            %existing,
            "conflicting re-classification routed to review"
        );
        self.review.push(proposed, evidence(field), None, source);
    }

    /// Guard pass over a resolved classification. Re-derivations are
    /// queued for review so the original mistake is not relearned.
    fn apply_guard(&mut self, field: &FieldDescriptor, c: Classification) -> Classification {
        match ModalityGuard::apply(field, c, self.oracle.as_deref()) {
            GuardOutcome::Unchanged(c) => c,
            GuardOutcome::Rederived(c) => {
                if validate_before_learning(field, c.field_type).is_ok() {
                    self.review.push(c.field_type, evidence(field), None, "guard");
                }
                c
            }
            GuardOutcome::Blocked(c) => c,
        }
    }
}

/// Question text for exact-cache keying and oracle prompts: the
/// surrounding question when present, the label otherwise.
fn question_text(field: &FieldDescriptor) -> String {
    field
        .section_context
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&field.label)
        .to_string()
}

fn evidence(field: &FieldDescriptor) -> ReviewEvidence {
    ReviewEvidence {
        label: Some(field.label.clone()),
        question: field.section_context.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::StubEmbedder;
    use crate::field::InputModality;
    use crate::oracle::{OracleError, ScriptedOracle};

    fn cascade() -> TrustCascade {
        TrustCascade::in_memory(ClassifierConfig::default()).unwrap()
    }

    fn yes_no_options() -> Vec<String> {
        vec!["Yes".to_string(), "No".to_string()]
    }

    #[test]
    fn test_tier1_identifier_no_oracle_calls() {
        // Workday-style first-name field resolves deterministically.
        let mut cascade = cascade();
        let oracle = Arc::new(ScriptedOracle::new());
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("First Name", InputModality::Text)
            .with_id("legalName--firstName")
            .with_platform("workday");
        let c = cascade.classify(&field, None);

        assert_eq!(c.field_type, FieldType::FirstName);
        assert_eq!(c.source, ClassificationSource::Tier1FieldId);
        assert!(c.verified);
        assert_eq!(oracle.total_calls(), 0);
    }

    #[test]
    fn test_tier1_deterministic_across_runs() {
        let mut cascade = cascade();
        let field = FieldDescriptor::new("Email Address", InputModality::Text);
        let first = cascade.classify(&field, None);
        let second = cascade.classify(&field, None);
        assert_eq!(first.field_type, second.field_type);
        assert_eq!(first.source, second.source);
        assert!(first.is_resolved());
    }

    #[test]
    fn test_no_oracle_no_signals_is_unresolved() {
        let mut cascade = cascade();
        let field = FieldDescriptor::new("Zorp", InputModality::Text);
        let c = cascade.classify(&field, None);
        assert!(!c.is_resolved());
        assert_eq!(c.source, ClassificationSource::Unresolved);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_tier2_bank_match_one_verify_then_exact_cache() {
        let mut cascade = cascade();
        let stub = Arc::new(StubEmbedder::new());
        cascade.set_embedder(stub.clone()).unwrap();
        let oracle = Arc::new(ScriptedOracle::new().with_verify(Ok(true)));
        cascade.set_oracle(oracle.clone());

        let question = "Will you now or in the future require sponsorship?";
        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_section(question)
            .with_options(yes_no_options());

        // Seed the bank with the exact context text so similarity is 1.
        let v = stub.embed(&field.context_text()).unwrap();
        cascade
            .bank
            .add(question, FieldType::VisaSponsorship, "seed", v);

        let c = cascade.classify(&field, None);
        assert_eq!(c.field_type, FieldType::VisaSponsorship);
        assert_eq!(c.source, ClassificationSource::Tier2Embedding);
        assert!(c.verified);
        assert_eq!(oracle.verify_calls(), 1);
        assert_eq!(oracle.classify_calls(), 0);

        // The identical question now resolves with zero network calls.
        let again = cascade.classify(&field, None);
        assert_eq!(again.source, ClassificationSource::Tier1ExactCache);
        assert_eq!(oracle.total_calls(), 1);
    }

    #[test]
    fn test_tier2_consensus_with_session_vote() {
        let mut config = ClassifierConfig::default();
        config.thresholds.consensus = 0.55;
        let mut cascade = TrustCascade::in_memory(config).unwrap();
        let oracle = Arc::new(ScriptedOracle::new().with_verify(Ok(true)));
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_id("custom--question--17")
            .with_section("Will you now or in the future require visa sponsorship?")
            .with_options(yes_no_options());

        // An earlier tier-3 run this session proposed a type; the
        // unverified cache entry votes, it does not resolve alone.
        cascade
            .cache
            .learn_session(&field, FieldType::VisaSponsorship, "tier3");

        let c = cascade.classify(&field, None);
        assert_eq!(c.field_type, FieldType::VisaSponsorship);
        assert_eq!(c.source, ClassificationSource::Tier2Consensus);
        assert!(c.verified);
        assert_eq!(oracle.verify_calls(), 1);
        assert_eq!(oracle.classify_calls(), 0);
    }

    #[test]
    fn test_tier2_verify_no_falls_to_tier3() {
        let mut config = ClassifierConfig::default();
        config.thresholds.consensus = 0.55;
        let mut cascade = TrustCascade::in_memory(config).unwrap();
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_verify(Ok(false))
                .with_classify(Ok(TaxonomyVerdict::Type(FieldType::VisaStatus))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_section("Will you now or in the future require visa sponsorship?")
            .with_options(yes_no_options());
        cascade
            .cache
            .learn_session(&field, FieldType::VisaSponsorship, "tier3");

        let c = cascade.classify(&field, None);
        assert_eq!(c.field_type, FieldType::VisaStatus);
        assert_eq!(c.source, ClassificationSource::Tier3Llm);
        assert!(!c.verified);
        assert_eq!(oracle.verify_calls(), 1);
        assert_eq!(oracle.classify_calls(), 1);
    }

    #[test]
    fn test_tier3_queues_review_and_carries_page_hint() {
        let mut cascade = cascade();
        let oracle =
            Arc::new(ScriptedOracle::new().with_classify(Ok(TaxonomyVerdict::Type(FieldType::Gender))));
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_section("Zorp zorp");
        let page = PageHint {
            questions: vec![
                "Gender".to_string(),
                "Zorp zorp".to_string(),
                "Veteran status".to_string(),
            ],
            position: 2,
            total: 3,
        };

        let c = cascade.classify(&field, Some(&page));
        assert_eq!(c.field_type, FieldType::Gender);
        assert_eq!(c.source, ClassificationSource::Tier3Llm);
        assert!(!c.verified);
        assert!(oracle.last_classify_prompt().contains("position 2 of 3"));

        // Tier-3 learning is staged, not permanent.
        assert_eq!(cascade.review().pending_count(), 1);
        assert_eq!(cascade.cache_stats().learned, 0);
        assert_eq!(cascade.cache_stats().session, 1);
    }

    #[test]
    fn test_tier3_positional_disambiguation() {
        // Two "Select One" dropdowns; the second is the sponsorship
        // question. The oracle sees both questions and the ordinal.
        let mut cascade = cascade();
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_verify(Err(OracleError::Timeout(30)))
                .with_classify(Ok(TaxonomyVerdict::Type(FieldType::VisaSponsorship))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_section("Are you a US Citizen? | Do you require sponsorship?")
            .with_options(yes_no_options());
        let page = PageHint {
            questions: vec![
                "Are you a US Citizen?".to_string(),
                "Do you require sponsorship?".to_string(),
            ],
            position: 2,
            total: 2,
        };

        let c = cascade.classify(&field, Some(&page));
        assert_eq!(c.field_type, FieldType::VisaSponsorship);
        assert_eq!(c.source, ClassificationSource::Tier3Llm);
        let prompt = oracle.last_classify_prompt();
        assert!(prompt.contains("position 2 of 2"));
        assert!(prompt.contains("US Citizen"));
        assert!(prompt.contains("sponsorship"));
    }

    #[test]
    fn test_tier3_session_entry_votes_but_oracle_reclassifies() {
        // A tier-3 result is usable within the run: it lands at the
        // session cache level, which never resolves on its own.
        let mut cascade = cascade();
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_verify(Err(OracleError::Timeout(30)))
                .with_classify(Ok(TaxonomyVerdict::Type(FieldType::NoticePeriod))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Notice duration thing", InputModality::Text)
            .with_id("custom--q9");
        let first = cascade.classify(&field, None);
        assert_eq!(first.source, ClassificationSource::Tier3Llm);

        let second = cascade.classify(&field, None);
        assert_eq!(second.field_type, FieldType::NoticePeriod);
        // The session hit votes at tier 2, so the second pass costs a
        // verification attempt at most, never silent trust.
        assert!(matches!(
            second.source,
            ClassificationSource::Tier2Consensus | ClassificationSource::Tier3Llm
        ));
    }

    #[test]
    fn test_auto_verify_writes_cache_directly() {
        let mut config = ClassifierConfig::default();
        config.auto_verify = true;
        let mut cascade = TrustCascade::in_memory(config).unwrap();
        let oracle = Arc::new(
            ScriptedOracle::new().with_classify(Ok(TaxonomyVerdict::Type(FieldType::Gpa))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Academic standing value", InputModality::Text)
            .with_id("custom--q4");
        let first = cascade.classify(&field, None);
        assert_eq!(first.source, ClassificationSource::Tier3Llm);
        assert_eq!(cascade.review().pending_count(), 0);
        assert_eq!(cascade.cache_stats().verified_learned, 1);

        let second = cascade.classify(&field, None);
        assert_eq!(second.field_type, FieldType::Gpa);
        assert_eq!(second.source, ClassificationSource::Tier1ExactCache);
        assert_eq!(oracle.classify_calls(), 1);
    }

    #[test]
    fn test_conflicting_learn_goes_to_review() {
        let mut config = ClassifierConfig::default();
        config.auto_verify = true;
        let mut cascade = TrustCascade::in_memory(config).unwrap();
        let oracle = Arc::new(
            ScriptedOracle::new().with_classify(Ok(TaxonomyVerdict::Type(FieldType::FieldOfStudy))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Area", InputModality::Text).with_id("custom--q12");
        cascade
            .cache
            .learn_pattern(&field, FieldType::School, "seed", true);

        // First writer wins; the conflicting proposal is staged for a
        // human instead of overwriting.
        cascade.learn_unreviewed(&field, "Area", FieldType::FieldOfStudy, "tier3");

        assert_eq!(cascade.review().pending_count(), 1);
        let hit = cascade.cache.lookup(&field).unwrap();
        assert_eq!(hit.field_type, FieldType::School);
    }

    #[test]
    fn test_guard_rederives_boolean_on_textarea() {
        // A pattern would classify this as work authorization, but
        // the trailing prior answer marks a free-text follow-up.
        let mut cascade = cascade();
        let field = FieldDescriptor::new(
            "Are you authorized to work? *No",
            InputModality::Textarea,
        );
        let c = cascade.classify(&field, None);
        assert!(!c.field_type.is_boolean_flavored());
        assert_eq!(c.source, ClassificationSource::GuardRederived);
        // The correction is staged for review.
        assert_eq!(cascade.review().pending_count(), 1);
    }

    #[test]
    fn test_out_of_taxonomy_falls_back_to_direct_answer() {
        let mut cascade = cascade();
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_classify(Ok(TaxonomyVerdict::OutOfTaxonomy("essay".to_string())))
                .with_direct(Ok("I have seven years of experience.".to_string())),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new(
            "Describe a challenge you overcame",
            InputModality::Textarea,
        );
        let profile = Profile {
            years_experience: Some(7),
            ..Profile::default()
        };
        let resolved = cascade.classify_and_resolve(&field, None, &profile);

        assert_eq!(resolved.source, ClassificationSource::Tier3DirectAnswer);
        assert_eq!(
            resolved.answer.as_deref(),
            Some("I have seven years of experience.")
        );
        assert_eq!(oracle.direct_calls(), 1);
    }

    #[test]
    fn test_none_of_the_above_is_unresolved_no_direct_answer() {
        let mut cascade = cascade();
        let oracle = Arc::new(
            ScriptedOracle::new().with_classify(Ok(TaxonomyVerdict::NoneOfTheAbove)),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Blorp", InputModality::Text);
        let resolved = cascade.classify_and_resolve(&field, None, &Profile::default());
        assert_eq!(resolved.field_type, FieldType::Unknown);
        assert_eq!(resolved.source, ClassificationSource::Unresolved);
        assert!(resolved.answer.is_none());
        assert_eq!(oracle.direct_calls(), 0);
    }

    #[test]
    fn test_classify_and_resolve_fills_from_profile() {
        let mut cascade = cascade();
        let field = FieldDescriptor::new("Email Address", InputModality::Text);
        let profile = Profile {
            email: Some("ada@example.com".to_string()),
            ..Profile::default()
        };
        let resolved = cascade.classify_and_resolve(&field, None, &profile);
        assert_eq!(resolved.field_type, FieldType::Email);
        assert_eq!(resolved.answer.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_oracle_failure_degrades_to_unresolved() {
        let mut cascade = cascade();
        let oracle = Arc::new(
            ScriptedOracle::new().with_classify(Err(OracleError::Timeout(30))),
        );
        cascade.set_oracle(oracle.clone());

        let field = FieldDescriptor::new("Blorp", InputModality::Text);
        let c = cascade.classify(&field, None);
        assert!(!c.is_resolved());
    }

    #[test]
    fn test_approved_review_materializes_on_merge() {
        let mut cascade = cascade();
        let id = cascade
            .review_mut()
            .push(
                FieldType::NoticePeriod,
                ReviewEvidence {
                    label: Some("Select One".to_string()),
                    question: Some("What is your notice period?".to_string()),
                },
                None,
                "tier3",
            )
            .id
            .clone();
        cascade.review_mut().approve(&id);
        cascade.merge_reviews();

        let field = FieldDescriptor::new("Select One", InputModality::Dropdown)
            .with_section("What is your notice period?");
        let c = cascade.classify(&field, None);
        assert_eq!(c.field_type, FieldType::NoticePeriod);
        assert_eq!(c.source, ClassificationSource::Tier1Cache);
        assert!(c.verified);
    }
}
