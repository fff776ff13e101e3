//! Pluggable text embedding: a neural ONNX backend when a model is
//! available, a deterministic hash-based backend when it is not (or when
//! configured explicitly), selected through one `Embedder` trait object.

pub mod config;
mod error;
mod hash;
mod onnx;

pub use config::{BackendMode, EmbedderConfig};
pub use error::EmbedderError;
pub use hash::HashEmbedder;
pub use onnx::OnnxEmbedder;

/// Which concrete backend produced a vector. Surfaced in `model_label` so a
/// caller can tell an `auto` fallback happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OnnxNeural,
    DeterministicHash,
}

#[derive(Debug, Clone)]
pub struct EmbedderInfo {
    pub provider: ProviderKind,
    pub model_label: String,
    pub dim: usize,
}

/// Text-to-vector capability. `embed_documents` is used during indexing and
/// fails hard on provider errors; `embed_query` degrades to `None` instead
/// of propagating an error, matching the `EmbedderUnavailable` handling in
/// search (semantic branch empty, lexical branch proceeds).
pub trait Embedder: Send + Sync {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;
    fn embed_query(&self, text: &str) -> Option<Vec<f32>>;
    fn info(&self) -> &EmbedderInfo;

    fn model_label(&self) -> &str {
        &self.info().model_label
    }

    fn dim(&self) -> usize {
        self.info().dim
    }
}

/// L2-normalizes a vector in place; leaves a zero vector untouched.
pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Truncates or zero-pads `vec` to exactly `dim` components. Applied
/// identically at index time and query time so retrieval never silently
/// degrades from a dimension mismatch.
pub(crate) fn force_fit(mut vec: Vec<f32>, dim: usize) -> Vec<f32> {
    match vec.len().cmp(&dim) {
        std::cmp::Ordering::Greater => vec.truncate(dim),
        std::cmp::Ordering::Less => vec.resize(dim, 0.0),
        std::cmp::Ordering::Equal => {}
    }
    vec
}

/// Builds the configured embedder. `Auto` attempts the neural backend and
/// falls back to deterministic hashing if construction fails; `OnnxLike`
/// does the same but is an explicit request for the neural backend (still
/// permitted to fall back, per the source's documented behavior); `Hash`
/// never attempts the neural backend.
pub fn build_embedder(cfg: &EmbedderConfig) -> Box<dyn Embedder> {
    match cfg.backend {
        BackendMode::Hash => Box::new(HashEmbedder::new(format!("{}-hash", cfg.embedding_model), cfg.embedding_dim)),
        BackendMode::Auto | BackendMode::OnnxLike => match OnnxEmbedder::new(cfg) {
            Ok(embedder) => Box::new(embedder),
            Err(err) => {
                tracing::warn!(error = %err, "neural embedder unavailable, falling back to deterministic hash");
                Box::new(HashEmbedder::new(format!("{}-hash-fallback", cfg.embedding_model), cfg.embedding_dim))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_fit_truncates_and_pads() {
        assert_eq!(force_fit(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(force_fit(vec![1.0], 3), vec![1.0, 0.0, 0.0]);
        assert_eq!(force_fit(vec![1.0, 2.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn auto_mode_falls_back_when_model_files_absent() {
        let cfg = EmbedderConfig {
            backend: BackendMode::Auto,
            model_path: "/nonexistent/model.onnx".into(),
            tokenizer_path: "/nonexistent/tokenizer.json".into(),
            runtime_library_path: "/nonexistent/onnxruntime.so".into(),
            ..EmbedderConfig::default()
        };
        let embedder = build_embedder(&cfg);
        assert_eq!(embedder.info().provider, ProviderKind::DeterministicHash);
        assert!(embedder.model_label().contains("fallback"));
        assert!(embedder.embed_query("hello").is_some());
    }

    #[test]
    fn hash_mode_never_touches_onnx() {
        let cfg = EmbedderConfig { backend: BackendMode::Hash, ..EmbedderConfig::default() };
        let embedder = build_embedder(&cfg);
        assert_eq!(embedder.info().provider, ProviderKind::DeterministicHash);
    }
}
