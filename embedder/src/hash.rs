use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::{force_fit, l2_normalize, Embedder, EmbedderError, EmbedderInfo, ProviderKind};

/// A stable keyed hash projected into a fixed-dimension vector. Requires no
/// model files and no runtime, so it keeps the system fully functional
/// offline and in CI — the same input always yields the same vector for a
/// given model label and dimension.
pub struct HashEmbedder {
    info: EmbedderInfo,
}

impl HashEmbedder {
    pub fn new(model_label: impl Into<String>, dim: usize) -> Self {
        Self {
            info: EmbedderInfo {
                provider: ProviderKind::DeterministicHash,
                model_label: model_label.into(),
                dim,
            },
        }
    }

    fn seed_for(&self, index: usize, text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.info.model_label.hash(&mut hasher);
        index.hash(&mut hasher);
        text.hash(&mut hasher);
        hasher.finish()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec: Vec<f32> = (0..self.info.dim)
            .map(|i| normalize_hash(self.seed_for(i, text)))
            .collect();
        l2_normalize(&mut vec);
        vec
    }
}

fn normalize_hash(hash: u64) -> f32 {
    ((hash as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
}

impl Embedder for HashEmbedder {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        Some(force_fit(self.embed_one(text), self.info.dim))
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_vector() {
        let embedder = HashEmbedder::new("hash-v1", 16);
        let a = embedder.embed_query("rust is great").unwrap();
        let b = embedder.embed_query("rust is great").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn different_input_yields_different_vector() {
        let embedder = HashEmbedder::new("hash-v1", 16);
        let a = embedder.embed_query("alpha").unwrap();
        let b = embedder.embed_query("beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn batch_matches_single() {
        let embedder = HashEmbedder::new("hash-v1", 8);
        let batch = embedder.embed_documents(&["x", "y"]).unwrap();
        assert_eq!(batch[0], embedder.embed_query("x").unwrap());
        assert_eq!(batch[1], embedder.embed_query("y").unwrap());
    }
}
