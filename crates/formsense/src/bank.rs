//! Question bank: known questions with embeddings.
//!
//! Grows only through approved or explicitly auto-verified learning.
//! Near-duplicates of an existing same-type entry (similarity >= 0.95)
//! are dropped at insert time, so the bank stays small and each entry
//! stays auditable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::similarity;
use crate::taxonomy::FieldType;

const DEDUP_SIMILARITY: f32 = 0.95;

/// One known question with its precomputed embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBankEntry {
    pub text: String,
    pub field_type: FieldType,
    /// Which tier or process contributed this entry.
    #[serde(default)]
    pub source: String,
    /// L2-normalized embedding vector.
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

/// A nearest-neighbor match, with the matched question text for
/// auditability.
#[derive(Debug, Clone)]
pub struct BankMatch {
    pub field_type: FieldType,
    pub matched_text: String,
    pub similarity: f32,
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankOutcome {
    Added,
    /// Too similar to an existing entry of the same type.
    Duplicate,
}

/// Persisted list of known questions.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    entries: Vec<QuestionBankEntry>,
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    memory_only: bool,
}

impl QuestionBank {
    pub fn in_memory() -> Self {
        Self {
            memory_only: true,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut bank = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read question bank {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("failed to parse question bank {}", path.display()))?
        } else {
            Self::default()
        };
        bank.path = Some(path.to_path_buf());
        bank.memory_only = false;
        debug!(entries = bank.entries.len(), "question bank loaded");
        Ok(bank)
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
            std::fs::write(&path, json).context("failed to write question bank")?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("question bank write failed, continuing in memory: {e:#}");
            self.memory_only = true;
        }
    }

    /// Nearest neighbor above the given threshold.
    pub fn nearest(&self, embedding: &[f32], threshold: f32) -> Option<BankMatch> {
        self.entries
            .iter()
            .map(|e| (e, similarity(embedding, &e.embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|(_, sim)| *sim >= threshold)
            .map(|(e, sim)| BankMatch {
                field_type: e.field_type,
                matched_text: e.text.clone(),
                similarity: sim,
            })
    }

    /// Add a question, deduplicating near-identical same-type entries.
    pub fn add(
        &mut self,
        text: impl Into<String>,
        field_type: FieldType,
        source: &str,
        embedding: Vec<f32>,
    ) -> BankOutcome {
        let is_duplicate = self.entries.iter().any(|e| {
            e.field_type == field_type && similarity(&embedding, &e.embedding) >= DEDUP_SIMILARITY
        });
        if is_duplicate {
            return BankOutcome::Duplicate;
        }
        self.entries.push(QuestionBankEntry {
            text: text.into(),
            field_type,
            source: source.to_string(),
            embedding,
            added_at: Some(Utc::now()),
        });
        BankOutcome::Added
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QuestionBankEntry] {
        &self.entries
    }
}
