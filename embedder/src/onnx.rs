use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use ndarray::Array2;
use ort::session::Session;
use tokenizers::Tokenizer;

use crate::config::EmbedderConfig;
use crate::{force_fit, l2_normalize, Embedder, EmbedderError, EmbedderInfo, ProviderKind};

static ORT_RUNTIME_PATH: OnceLock<PathBuf> = OnceLock::new();

fn ensure_ort_initialized(runtime_library_path: &Path) -> Result<(), EmbedderError> {
    if let Some(existing) = ORT_RUNTIME_PATH.get() {
        if existing != runtime_library_path {
            return Err(EmbedderError::InvalidConfiguration {
                message: format!(
                    "onnx runtime already initialized with {}, cannot switch to {}",
                    existing.display(),
                    runtime_library_path.display()
                ),
            });
        }
        return Ok(());
    }
    ort::init_from(runtime_library_path.to_string_lossy().to_string())
        .with_name("rifflux")
        .commit()
        .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;
    let _ = ORT_RUNTIME_PATH.set(runtime_library_path.to_path_buf());
    Ok(())
}

/// Neural embedder backed by a local ONNX model and tokenizer, run via
/// `ort`'s in-process session. Mean-pools the last hidden state over
/// attention-masked positions to produce one vector per input.
pub struct OnnxEmbedder {
    info: EmbedderInfo,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    pad_id: i64,
    max_input_length: usize,
}

impl OnnxEmbedder {
    pub fn new(cfg: &EmbedderConfig) -> Result<Self, EmbedderError> {
        if cfg.embedding_dim == 0 {
            return Err(EmbedderError::InvalidConfiguration { message: "embedding_dim must be > 0".into() });
        }
        if cfg.max_input_length == 0 {
            return Err(EmbedderError::InvalidConfiguration { message: "max_input_length must be > 0".into() });
        }

        let model_path = cfg.model_path.canonicalize().map_err(|e| EmbedderError::InvalidConfiguration {
            message: format!("model path {}: {e}", cfg.model_path.display()),
        })?;
        let tokenizer_path = cfg.tokenizer_path.canonicalize().map_err(|e| EmbedderError::InvalidConfiguration {
            message: format!("tokenizer path {}: {e}", cfg.tokenizer_path.display()),
        })?;
        let runtime_path = cfg.runtime_library_path.canonicalize().map_err(|e| EmbedderError::InvalidConfiguration {
            message: format!("runtime library path {}: {e}", cfg.runtime_library_path.display()),
        })?;

        ensure_ort_initialized(&runtime_path)?;

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;
        let pad_id = tokenizer
            .token_to_id("<pad>")
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .ok_or_else(|| EmbedderError::InvalidConfiguration { message: "tokenizer has no pad token".into() })?
            as i64;
        let max_input_length = cfg.max_input_length;

        Ok(Self {
            info: EmbedderInfo {
                provider: ProviderKind::OnnxNeural,
                model_label: cfg.embedding_model.clone(),
                dim: cfg.embedding_dim,
            },
            session: Mutex::new(session),
            tokenizer,
            pad_id,
            max_input_length,
        })
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        for encoding in &encodings {
            let len = encoding.get_ids().len();
            if len > self.max_input_length {
                return Err(EmbedderError::InputTooLong { max_length: self.max_input_length, actual_length: len });
            }
        }

        let batch = encodings.len();
        let mut input_ids = Array2::<i64>::from_elem((batch, max_len), self.pad_id);
        let mut attention_mask = Array2::<i64>::zeros((batch, max_len));
        for (row, encoding) in encodings.iter().enumerate() {
            for (col, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[[row, col]] = id as i64;
                attention_mask[[row, col]] = 1;
            }
        }

        let mut session = self.session.lock().expect("onnx session mutex poisoned");
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids.view(),
                "attention_mask" => attention_mask.view(),
            ]
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?)
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;

        let (shape, data) = outputs[0]
            .try_extract_raw_tensor::<f32>()
            .map_err(|e| EmbedderError::ProviderFailure { message: e.to_string() })?;
        if shape.len() != 3 {
            return Err(EmbedderError::ProviderFailure { message: format!("unexpected output rank {}", shape.len()) });
        }
        let hidden = shape[2] as usize;

        let mut vectors = Vec::with_capacity(batch);
        for row in 0..batch {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for col in 0..max_len {
                if attention_mask[[row, col]] == 0 {
                    continue;
                }
                let base = (row * max_len + col) * hidden;
                for h in 0..hidden {
                    pooled[h] += data[base + h];
                }
                count += 1.0;
            }
            if count > 0.0 {
                for v in pooled.iter_mut() {
                    *v /= count;
                }
            }
            l2_normalize(&mut pooled);
            vectors.push(force_fit(pooled, self.info.dim));
        }
        Ok(vectors)
    }
}

impl Embedder for OnnxEmbedder {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.encode_batch(texts)
    }

    fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        self.encode_batch(&[text]).ok().and_then(|mut v| v.pop())
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}
