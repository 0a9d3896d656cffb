//! Human review queue for learned associations.
//!
//! Every tier-3 learning event (and every guard correction) lands
//! here as a pending item. Nothing pending ever becomes permanent
//! ground truth: at the start of the next run, approved items are
//! materialized into the cache and question bank, rejected items are
//! discarded, and pending items stay pending, usable only as
//! ephemeral in-session hints.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bank::QuestionBank;
use crate::cache::CacheStore;
use crate::embedding::Embedder;
use crate::field::normalize_question;
use crate::taxonomy::FieldType;

/// Review lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// Evidence behind a proposed association.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewEvidence {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

impl ReviewEvidence {
    fn primary_text(&self) -> Option<&str> {
        self.question.as_deref().or(self.label.as_deref())
    }
}

/// One proposed (type, evidence) association awaiting human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub field_type: FieldType,
    pub evidence: ReviewEvidence,
    #[serde(default)]
    pub proposed_answer: Option<String>,
    /// Which tier or guard produced the proposal.
    pub source: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Persisted staging area for learned associations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReviewQueue {
    #[serde(default)]
    items: Vec<ReviewItem>,
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    memory_only: bool,
}

impl ReviewQueue {
    pub fn in_memory() -> Self {
        Self {
            memory_only: true,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut queue = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read review queue {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("failed to parse review queue {}", path.display()))?
        } else {
            Self::default()
        };
        queue.path = Some(path.to_path_buf());
        queue.memory_only = false;
        debug!(items = queue.items.len(), "review queue loaded");
        Ok(queue)
    }

    pub fn flush(&mut self) {
        if self.memory_only {
            return;
        }
        let Some(path) = self.path.clone() else {
            return;
        };
        let result = (|| -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("failed to create store directory")?;
            }
            let json = serde_json::to_string_pretty(self)?;
            std::fs::write(&path, json).context("failed to write review queue")?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("review queue write failed, continuing in memory: {e:#}");
            self.memory_only = true;
        }
    }

    /// Queue a proposal. Appends are deduplicated: an existing
    /// pending item with the same type and evidence is left alone.
    pub fn push(
        &mut self,
        field_type: FieldType,
        evidence: ReviewEvidence,
        proposed_answer: Option<String>,
        source: &str,
    ) -> &ReviewItem {
        let duplicate_at = self.items.iter().position(|item| {
            item.status == ReviewStatus::Pending
                && item.field_type == field_type
                && normalized(&item.evidence) == normalized(&evidence)
        });
        let index = match duplicate_at {
            Some(i) => i,
            None => {
                self.items.push(ReviewItem {
                    id: uuid::Uuid::new_v4().to_string(),
                    field_type,
                    evidence,
                    proposed_answer,
                    source: source.to_string(),
                    status: ReviewStatus::Pending,
                    created_at: Utc::now(),
                });
                self.items.len() - 1
            }
        };
        &self.items[index]
    }

    pub fn approve(&mut self, id: &str) -> bool {
        self.set_status(id, ReviewStatus::Approved)
    }

    pub fn reject(&mut self, id: &str) -> bool {
        self.set_status(id, ReviewStatus::Rejected)
    }

    fn set_status(&mut self, id: &str, status: ReviewStatus) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }

    /// Startup merge: approved items materialize into the permanent
    /// cache and question bank, rejected items are dropped, pending
    /// items remain. The embedder is optional; without one, approved
    /// questions still land in the cache's question level but not in
    /// the bank.
    pub fn merge_into(
        &mut self,
        cache: &mut CacheStore,
        bank: &mut QuestionBank,
        embedder: Option<&dyn Embedder>,
    ) {
        let mut approved = 0usize;
        let mut rejected = 0usize;

        for item in &self.items {
            match item.status {
                ReviewStatus::Approved => {
                    approved += 1;
                    if let Some(text) = item.evidence.primary_text() {
                        cache.learn_question(text, item.field_type, "review_approved", true);
                        if let Some(embedder) = embedder {
                            match embedder.embed(text) {
                                Ok(v) => {
                                    bank.add(text, item.field_type, "review_approved", v);
                                }
                                Err(e) => {
                                    warn!("could not embed approved question: {e}");
                                }
                            }
                        }
                    }
                }
                ReviewStatus::Rejected => rejected += 1,
                ReviewStatus::Pending => {}
            }
        }

        self.items.retain(|i| i.status == ReviewStatus::Pending);
        if approved + rejected > 0 {
            info!(approved, rejected, "review queue merged");
        }
    }

    /// Ephemeral hint from a pending item whose evidence matches the
    /// given question text. Never treated as verified ground truth.
    pub fn session_hint(&self, text: &str) -> Option<FieldType> {
        let key = normalize_question(text);
        if key.is_empty() {
            return None;
        }
        self.items
            .iter()
            .filter(|i| i.status == ReviewStatus::Pending)
            .find(|i| {
                i.evidence
                    .primary_text()
                    .map(|t| normalize_question(t) == key)
                    .unwrap_or(false)
            })
            .map(|i| i.field_type)
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn pending_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ReviewStatus::Pending)
            .count()
    }
}

fn normalized(evidence: &ReviewEvidence) -> String {
    evidence
        .primary_text()
        .map(normalize_question)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(question: &str) -> ReviewEvidence {
        ReviewEvidence {
            label: None,
            question: Some(question.to_string()),
        }
    }

    #[test]
    fn test_push_dedups_pending() {
        let mut queue = ReviewQueue::in_memory();
        queue.push(
            FieldType::VisaStatus,
            evidence("What visa do you hold?"),
            None,
            "tier3",
        );
        queue.push(
            FieldType::VisaStatus,
            evidence("what visa do you hold"),
            None,
            "tier3",
        );
        assert_eq!(queue.items().len(), 1);
    }

    #[test]
    fn test_approved_items_materialize_and_leave_queue() {
        let mut queue = ReviewQueue::in_memory();
        let id = queue
            .push(
                FieldType::NoticePeriod,
                evidence("What is your notice period?"),
                None,
                "tier3",
            )
            .id
            .clone();
        queue.approve(&id);

        let mut cache = CacheStore::in_memory();
        let mut bank = QuestionBank::in_memory();
        queue.merge_into(&mut cache, &mut bank, None);

        assert_eq!(queue.items().len(), 0);
        // Materialized as a question-text rule.
        let f = crate::field::FieldDescriptor::new(
            "Select One",
            crate::field::InputModality::Dropdown,
        )
        .with_section("What is your notice period?");
        let hit = cache.lookup(&f).unwrap();
        assert_eq!(hit.field_type, FieldType::NoticePeriod);
        assert!(hit.verified);
    }

    #[test]
    fn test_rejected_items_dropped_without_materializing() {
        let mut queue = ReviewQueue::in_memory();
        let id = queue
            .push(
                FieldType::Gpa,
                evidence("What was your GPA?"),
                None,
                "tier3",
            )
            .id
            .clone();
        queue.reject(&id);

        let mut cache = CacheStore::in_memory();
        let mut bank = QuestionBank::in_memory();
        queue.merge_into(&mut cache, &mut bank, None);

        assert_eq!(queue.items().len(), 0);
        assert_eq!(cache.stats().question, 0);
        assert!(bank.is_empty());
    }

    #[test]
    fn test_pending_items_survive_merge_but_stay_inert() {
        let mut queue = ReviewQueue::in_memory();
        queue.push(
            FieldType::ReferralName,
            evidence("Who referred you?"),
            None,
            "tier3",
        );

        let mut cache = CacheStore::in_memory();
        let mut bank = QuestionBank::in_memory();
        queue.merge_into(&mut cache, &mut bank, None);

        assert_eq!(queue.pending_count(), 1);
        assert_eq!(cache.stats().question, 0);
        assert!(bank.is_empty());

        // Usable as a session hint only.
        assert_eq!(
            queue.session_hint("Who referred you?"),
            Some(FieldType::ReferralName)
        );
    }

    #[test]
    fn test_roundtrip_preserves_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");

        {
            let mut queue = ReviewQueue::load(&path).unwrap();
            queue.push(FieldType::Degree, evidence("Highest degree?"), None, "tier3");
            queue.flush();
        }

        let queue = ReviewQueue::load(&path).unwrap();
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.items()[0].status, ReviewStatus::Pending);
    }
}
