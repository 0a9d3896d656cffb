//! Classifier configuration.
//!
//! TOML-backed, with serde defaults for every field so a partial
//! config file (or none at all) still yields a working setup. The
//! threshold defaults consolidate the historical revisions of the
//! cascade; none of them is a frozen constant.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::consensus::SourceWeights;
use crate::embedding::EmbeddingConfig;
use crate::oracle::OracleConfig;

/// Similarity and confidence thresholds used across the cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum centroid similarity for an embedding vote.
    pub centroid_similarity: f32,
    /// Minimum question-bank similarity for a tier-2 candidate.
    pub bank_similarity: f32,
    /// Minimum zero-shot top share to cast a consensus vote.
    pub zero_shot_standalone: f32,
    /// Minimum zero-shot top share when it is the only voter.
    pub zero_shot_solo: f32,
    /// Minimum effective confidence for consensus acceptance.
    pub consensus: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            centroid_similarity: 0.70,
            bank_similarity: 0.82,
            zero_shot_standalone: 0.45,
            zero_shot_solo: 0.85,
            consensus: 0.85,
        }
    }
}

/// Top-level classifier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Override for the store directory. Defaults to the XDG data dir.
    pub data_dir: Option<PathBuf>,

    /// Bootstrap mode: learned associations skip the review queue and
    /// are written directly to the permanent cache as verified.
    /// Off by default; intended only for seeding a fresh install.
    pub auto_verify: bool,

    pub thresholds: Thresholds,
    pub weights: SourceWeights,
    pub oracle: OracleConfig,
    pub embedding: EmbeddingConfig,
}

impl ClassifierConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Load the default config file, falling back to defaults when it
    /// does not exist.
    pub fn load_default() -> Result<Self> {
        let path = crate::paths::config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(crate::paths::data_dir)
    }
}
