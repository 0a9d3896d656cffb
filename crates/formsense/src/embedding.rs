//! Embedding similarity matching.
//!
//! Vectors are fixed-dimension and L2-normalized; similarity is the
//! dot product. Two uses: per-type centroid matching (average of the
//! canonical phrasings per type) and nearest-neighbor lookup against
//! the question bank.
//!
//! The embedder is optional. When the backend is missing or
//! unreachable the cascade treats it as a signal with no vote.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::taxonomy::FieldType;

/// Produces L2-normalized embedding vectors for text.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ClassifyError>;
}

/// L2-normalize a vector in place and return it. Zero vectors are
/// returned unchanged.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Dot product of two normalized vectors. Dimension mismatch scores
/// 0.0 rather than panicking (a model swap invalidates old vectors).
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_secs: 15,
        }
    }
}

/// HTTP embedder speaking the Ollama embeddings API.
pub struct OllamaEmbedder {
    config: EmbeddingConfig,
    client: reqwest::blocking::Client,
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, ClassifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifyError::SignalUnavailable(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ClassifyError> {
        if !self.config.enabled {
            return Err(ClassifyError::SignalUnavailable(
                "embedding backend disabled".to_string(),
            ));
        }

        let url = format!("{}/api/embeddings", self.config.endpoint);
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| ClassifyError::SignalUnavailable(format!("embed request: {e}")))?;

        if !response.status().is_success() {
            return Err(ClassifyError::SignalUnavailable(format!(
                "embed backend HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .map_err(|e| ClassifyError::SignalUnavailable(format!("embed response: {e}")))?;

        let vector: Vec<f32> = json
            .get("embedding")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
            .unwrap_or_default();

        if vector.is_empty() {
            return Err(ClassifyError::SignalUnavailable(
                "embed backend returned empty vector".to_string(),
            ));
        }

        Ok(l2_normalize(vector))
    }
}

/// Precomputed per-type centroid embeddings. Built once per process
/// lifetime; safe to share read-only afterwards.
pub struct CentroidIndex {
    centroids: Vec<(FieldType, Vec<f32>)>,
}

impl CentroidIndex {
    /// Embed every canonical phrasing for every type and average.
    /// One backend failure aborts the build: a partial index would
    /// bias matching toward whichever types happened to embed.
    pub fn build(embedder: &dyn Embedder) -> Result<Self, ClassifyError> {
        let mut centroids = Vec::with_capacity(FieldType::ALL.len());
        for t in FieldType::ALL {
            let mut texts: Vec<&str> = vec![t.description()];
            texts.extend_from_slice(t.phrasings());

            let mean = mean_embedding(embedder, &texts)?;
            centroids.push((*t, l2_normalize(mean)));
        }
        debug!(types = centroids.len(), "centroid index built");
        Ok(Self { centroids })
    }

    /// Best matching type for a field-context embedding, with its
    /// similarity. Thresholding is the caller's concern.
    pub fn best_match(&self, embedding: &[f32]) -> Option<(FieldType, f32)> {
        self.centroids
            .iter()
            .map(|(t, c)| (*t, similarity(embedding, c)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Mean of the embeddings of `texts`. Vectors whose dimension differs
/// from the first one are skipped with a warning and excluded from the
/// divisor, so a stray mismatch does not shrink the mean.
fn mean_embedding(embedder: &dyn Embedder, texts: &[&str]) -> Result<Vec<f32>, ClassifyError> {
    let mut sum: Vec<f32> = Vec::new();
    let mut summed = 0usize;
    for text in texts {
        let v = embedder.embed(text)?;
        if sum.is_empty() {
            sum = v;
            summed = 1;
        } else if sum.len() == v.len() {
            for (s, x) in sum.iter_mut().zip(v.iter()) {
                *s += x;
            }
            summed += 1;
        } else {
            warn!(
                expected = sum.len(),
                got = v.len(),
                "embedding dimension mismatch, phrasing excluded from centroid"
            );
        }
    }
    for s in &mut sum {
        *s /= summed as f32;
    }
    Ok(sum)
}


#[cfg(test)]
mod tests {
    use super::testing::StubEmbedder;
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let zero = l2_normalize(vec![0.0, 0.0]);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_similarity_identical_is_one() {
        let v = l2_normalize(vec![1.0, 2.0, 3.0]);
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similarity_dimension_mismatch_is_zero() {
        assert_eq!(similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_stub_embedder_deterministic() {
        let e = StubEmbedder::new();
        let a = e.embed("do you require sponsorship").unwrap();
        let b = e.embed("do you require sponsorship").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_centroid_index_best_match() {
        let index = CentroidIndex {
            centroids: vec![
                (FieldType::Email, l2_normalize(vec![1.0, 0.0])),
                (FieldType::Phone, l2_normalize(vec![0.0, 1.0])),
            ],
        };
        let (t, score) = index.best_match(&l2_normalize(vec![0.9, 0.1])).unwrap();
        assert_eq!(t, FieldType::Email);
        assert!(score > 0.9);
    }

    #[test]
    fn test_mean_embedding_excludes_mismatched_dimensions() {
        struct MixedDims;
        impl Embedder for MixedDims {
            fn embed(&self, text: &str) -> Result<Vec<f32>, ClassifyError> {
                if text == "wide" {
                    Ok(vec![0.5, 0.5, 0.5, 0.5])
                } else {
                    Ok(vec![1.0, 0.0, 0.0])
                }
            }
        }
        // Two dim-3 vectors averaged; the dim-4 one must not count
        // toward the divisor.
        let mean = mean_embedding(&MixedDims, &["a", "wide", "b"]).unwrap();
        assert_eq!(mean, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_centroid_index_builds_every_type() {
        let e = StubEmbedder::new();
        let index = CentroidIndex::build(&e).unwrap();
        assert_eq!(index.centroids.len(), FieldType::ALL.len());
        for (_, c) in &index.centroids {
            let norm: f32 = c.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }
}
