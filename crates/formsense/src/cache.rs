//! Hierarchical field cache and exact-match question cache.
//!
//! Lookup order: global rules (apply everywhere) -> platform-specific
//! rules -> question-text rules -> learned entries -> session-local
//! entries. A given key maps to at most one field type; the first
//! writer wins and later classifications only bump usage counters.
//! Conflicting re-classification goes through the review queue, never
//! a silent overwrite.
//!
//! Stores are explicit objects with a load/flush lifecycle. A write
//! failure logs a warning and degrades the store to memory-only for
//! the rest of the run; it never aborts classification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::field::{id_suffix, normalize_label, normalize_question, FieldDescriptor};
use crate::taxonomy::FieldType;

/// Which cache level produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    Global,
    Platform,
    Question,
    Learned,
    Session,
}

/// One cached association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub field_type: FieldType,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Which tier or process produced this entry.
    #[serde(default)]
    pub learned_from: String,
}

impl CacheEntry {
    pub fn new(field_type: FieldType, learned_from: impl Into<String>, verified: bool) -> Self {
        Self {
            field_type,
            verified,
            verified_at: verified.then(Utc::now),
            verified_by: None,
            usage_count: 0,
            last_used_at: None,
            learned_from: learned_from.into(),
        }
    }

    fn touch(&mut self) {
        self.usage_count += 1;
        self.last_used_at = Some(Utc::now());
    }
}

/// A cache lookup result.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub field_type: FieldType,
    pub verified: bool,
    pub level: CacheLevel,
}

/// Outcome of a learn attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// New association written.
    Inserted,
    /// Key already held the same type; usage counter bumped.
    Repeat,
    /// Key already held a different type; nothing written. The
    /// caller routes the conflict through the review queue.
    Conflict(FieldType),
}

/// Serialized shape of the cache file. Session entries never persist.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    global: HashMap<String, serde_json::Value>,
    #[serde(default)]
    platform: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default)]
    question: HashMap<String, serde_json::Value>,
    #[serde(default)]
    learned: HashMap<String, serde_json::Value>,
}

/// Layered field-association store.
pub struct CacheStore {
    global: HashMap<String, CacheEntry>,
    platform: HashMap<String, HashMap<String, CacheEntry>>,
    question: HashMap<String, CacheEntry>,
    learned: HashMap<String, CacheEntry>,
    session: HashMap<String, CacheEntry>,
    path: Option<PathBuf>,
    memory_only: bool,
}

impl CacheStore {
    /// In-memory store with the built-in rule levels seeded.
    pub fn in_memory() -> Self {
        let mut store = Self {
            global: HashMap::new(),
            platform: HashMap::new(),
            question: HashMap::new(),
            learned: HashMap::new(),
            session: HashMap::new(),
            path: None,
            memory_only: true,
        };
        store.seed_builtin_rules();
        store
    }

    /// Load from disk, quarantining malformed entries instead of
    /// failing the whole store. A missing file starts empty.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self::in_memory();
        store.path = Some(path.to_path_buf());
        store.memory_only = false;

        if !path.exists() {
            return Ok(store);
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache store {}", path.display()))?;
        let file: CacheFile = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse cache store {}", path.display()))?;

        store.global.extend(parse_entries(file.global, "global"));
        for (platform, entries) in file.platform {
            store
                .platform
                .entry(platform)
                .or_default()
                .extend(parse_entries(entries, "platform"));
        }
        store.question.extend(parse_entries(file.question, "question"));
        store.learned.extend(parse_entries(file.learned, "learned"));

        debug!(
            learned = store.learned.len(),
            question = store.question.len(),
            "cache store loaded"
        );
        Ok(store)
    }

    /// Persist the durable levels. On failure, warn and degrade to
    /// memory-only for the rest of the run.
    pub fn flush(&mut self) {
        if self.memory_only {
            return;
        }
        let Some(path) = self.path.clone() else {
            return;
        };
        if let Err(e) = self.write_to(&path) {
            warn!("cache store write failed, continuing in memory: {e:#}");
            self.memory_only = true;
        }
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let file = CacheFile {
            global: to_values(&self.global),
            platform: self
                .platform
                .iter()
                .map(|(p, entries)| (p.clone(), to_values(entries)))
                .collect(),
            question: to_values(&self.question),
            learned: to_values(&self.learned),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create store directory")?;
        }
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).context("failed to write cache store")?;
        Ok(())
    }

    /// Normalized signature for the learned/session levels.
    pub fn field_key(field: &FieldDescriptor) -> String {
        format!(
            "{}|{}|{}|{}",
            field.platform.as_deref().unwrap_or("*").to_lowercase(),
            field.id.as_deref().map(id_suffix).unwrap_or_default(),
            normalize_label(&field.label),
            field.modality.as_str()
        )
    }

    /// Walk the levels in order and return the first hit, bumping its
    /// usage counters.
    pub fn lookup(&mut self, field: &FieldDescriptor) -> Option<CacheHit> {
        let label_key = normalize_label(&field.label);
        let question_key = field
            .section_context
            .as_deref()
            .map(normalize_question)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| normalize_question(&field.label));
        let field_key = Self::field_key(field);

        if let Some(entry) = self.global.get_mut(&label_key) {
            entry.touch();
            return Some(hit(entry, CacheLevel::Global));
        }

        if let Some(platform) = field.platform.as_deref().map(str::to_lowercase) {
            if let Some(entries) = self.platform.get_mut(&platform) {
                let platform_key = field
                    .id
                    .as_deref()
                    .map(id_suffix)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| label_key.clone());
                if let Some(entry) = entries.get_mut(&platform_key) {
                    entry.touch();
                    return Some(hit(entry, CacheLevel::Platform));
                }
            }
        }

        if let Some(entry) = self.question.get_mut(&question_key) {
            entry.touch();
            return Some(hit(entry, CacheLevel::Question));
        }

        if let Some(entry) = self.learned.get_mut(&field_key) {
            entry.touch();
            return Some(hit(entry, CacheLevel::Learned));
        }

        if let Some(entry) = self.session.get_mut(&field_key) {
            entry.touch();
            return Some(hit(entry, CacheLevel::Session));
        }

        None
    }

    /// Learn an association at the learned (persisted) level. Never
    /// overwrites: first writer wins, repeats bump usage.
    pub fn learn_pattern(
        &mut self,
        field: &FieldDescriptor,
        field_type: FieldType,
        learned_from: &str,
        verified: bool,
    ) -> LearnOutcome {
        let key = Self::field_key(field);
        insert_first_writer(&mut self.learned, key, field_type, learned_from, verified)
    }

    /// Learn an association for the current session only.
    pub fn learn_session(
        &mut self,
        field: &FieldDescriptor,
        field_type: FieldType,
        learned_from: &str,
    ) -> LearnOutcome {
        let key = Self::field_key(field);
        insert_first_writer(&mut self.session, key, field_type, learned_from, false)
    }

    /// Learn a question-text rule (used when approved review items
    /// are materialized).
    pub fn learn_question(
        &mut self,
        question: &str,
        field_type: FieldType,
        learned_from: &str,
        verified: bool,
    ) -> LearnOutcome {
        let key = normalize_question(question);
        if key.is_empty() {
            return LearnOutcome::Conflict(field_type);
        }
        insert_first_writer(&mut self.question, key, field_type, learned_from, verified)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            global: self.global.len(),
            platform: self.platform.values().map(HashMap::len).sum(),
            question: self.question.len(),
            learned: self.learned.len(),
            session: self.session.len(),
            verified_learned: self.learned.values().filter(|e| e.verified).count(),
        }
    }

    /// Curated rules that ship with the classifier. Global rules key
    /// on the normalized label; platform rules on the identifier
    /// suffix quirks of specific job boards.
    fn seed_builtin_rules(&mut self) {
        let global: &[(&str, FieldType)] = &[
            ("first name", FieldType::FirstName),
            ("last name", FieldType::LastName),
            ("email address", FieldType::Email),
            ("phone number", FieldType::Phone),
            ("linkedin profile", FieldType::Linkedin),
            ("cover letter", FieldType::CoverLetter),
            ("city", FieldType::City),
            ("zip postal code", FieldType::PostalCode),
        ];
        for (label, field_type) in global {
            self.global
                .entry((*label).to_string())
                .or_insert_with(|| CacheEntry::new(*field_type, "builtin", true));
        }

        let workday: &[(&str, FieldType)] = &[
            ("firstname", FieldType::FirstName),
            ("lastname", FieldType::LastName),
            ("postalcode", FieldType::PostalCode),
        ];
        let entries = self.platform.entry("workday".to_string()).or_default();
        for (suffix, field_type) in workday {
            entries
                .entry((*suffix).to_string())
                .or_insert_with(|| CacheEntry::new(*field_type, "builtin", true));
        }
    }
}

fn hit(entry: &CacheEntry, level: CacheLevel) -> CacheHit {
    CacheHit {
        field_type: entry.field_type,
        verified: entry.verified,
        level,
    }
}

fn insert_first_writer(
    map: &mut HashMap<String, CacheEntry>,
    key: String,
    field_type: FieldType,
    learned_from: &str,
    verified: bool,
) -> LearnOutcome {
    match map.get_mut(&key) {
        Some(existing) if existing.field_type == field_type => {
            existing.touch();
            LearnOutcome::Repeat
        }
        Some(existing) => LearnOutcome::Conflict(existing.field_type),
        None => {
            map.insert(key, CacheEntry::new(field_type, learned_from, verified));
            LearnOutcome::Inserted
        }
    }
}

fn parse_entries(
    raw: HashMap<String, serde_json::Value>,
    level: &str,
) -> HashMap<String, CacheEntry> {
    let mut entries = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => {
                // Quarantine: skip the malformed entry, keep the rest.
                warn!("skipping malformed {level} cache entry {key:?}: {e}");
            }
        }
    }
    entries
}

fn to_values(entries: &HashMap<String, CacheEntry>) -> HashMap<String, serde_json::Value> {
    entries
        .iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
        .collect()
}

/// Per-level entry counts for inspection tooling.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub global: usize,
    pub platform: usize,
    pub question: usize,
    pub learned: usize,
    pub session: usize,
    pub verified_learned: usize,
}

/// Validation gate run before any learned association persists.
/// Rejected associations are still usable for the current run.
pub fn validate_before_learning(
    field: &FieldDescriptor,
    field_type: FieldType,
) -> Result<(), ClassifyError> {
    if field_type.is_boolean_flavored() && field.modality.is_free_text() {
        return Err(ClassifyError::ValidationRejected(format!(
            "boolean-flavored type {field_type} on free-text modality"
        )));
    }
    if field_type.expects_free_text() && field.modality.is_constrained_choice() {
        return Err(ClassifyError::ValidationRejected(format!(
            "free-text type {field_type} on constrained-choice modality"
        )));
    }
    // A question naming a specific visa class is about the visa
    // status itself, not generic sponsorship or authorization.
    if matches!(
        field_type,
        FieldType::VisaSponsorship | FieldType::WorkAuthorization
    ) && mentions_specific_visa_class(&field.context_text())
    {
        return Err(ClassifyError::ValidationRejected(format!(
            "specific visa class mentioned but classified as {field_type}"
        )));
    }
    Ok(())
}

fn mentions_specific_visa_class(text: &str) -> bool {
    let tokens = crate::field::tokenize(text);
    tokens.iter().any(|t| {
        matches!(
            t.as_str(),
            "h1b" | "h1" | "h4" | "l1" | "tn" | "opt" | "cpt" | "f1" | "j1" | "ead"
        )
    })
}

// ============================================================================
// Exact-match question cache
// ============================================================================

/// Map of normalized question string -> learned field type. A tier-2
/// verification or approved review item writes here so the identical
/// question resolves with zero network calls next time.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExactCache {
    #[serde(default)]
    entries: HashMap<String, FieldType>,
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    memory_only: bool,
}

impl ExactCache {
    pub fn in_memory() -> Self {
        Self {
            memory_only: true,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut cache = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read exact cache {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("failed to parse exact cache {}", path.display()))?
        } else {
            Self::default()
        };
        cache.path = Some(path.to_path_buf());
        cache.memory_only = false;
        Ok(cache)
    }

    pub fn get(&self, question: &str) -> Option<FieldType> {
        let key = normalize_question(question);
        self.entries.get(&key).copied()
    }

    /// First writer wins, same as every other cache level.
    pub fn insert(&mut self, question: &str, field_type: FieldType) {
        let key = normalize_question(question);
        if key.is_empty() {
            return;
        }
        self.entries.entry(key).or_insert(field_type);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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
            std::fs::write(&path, json).context("failed to write exact cache")?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("exact cache write failed, continuing in memory: {e:#}");
            self.memory_only = true;
        }
    }
}
