use std::path::PathBuf;

/// Which backend to construct. Mirrors the `embedding_backend` configuration
/// option: `auto` tries the neural backend first and falls back to the
/// deterministic hash backend if it fails to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    Auto,
    OnnxLike,
    Hash,
}

impl Default for BackendMode {
    fn default() -> Self {
        BackendMode::Auto
    }
}

/// Defaults for the neural (ONNX) backend, mirroring how the source project
/// pins model/tokenizer/runtime paths as named constants.
pub struct OnnxDefaults {
    pub model_path: &'static str,
    pub tokenizer_path: &'static str,
    pub runtime_library_path: &'static str,
    pub embedding_dimension: usize,
    pub max_input_tokens: usize,
    pub embedding_model_id: &'static str,
}

pub const ONNX_DEFAULTS: OnnxDefaults = OnnxDefaults {
    model_path: "models/bge-small-en-v1.5/model.onnx",
    tokenizer_path: "models/bge-small-en-v1.5/tokenizer.json",
    runtime_library_path: "bin/onnxruntime/lib/onnxruntime.so",
    embedding_dimension: 384,
    max_input_tokens: 512,
    embedding_model_id: "BAAI/bge-small-en-v1.5",
};

/// Full embedder configuration surface (§6 of the engine spec).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub backend: BackendMode,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,
    #[serde(default = "default_runtime_library_path")]
    pub runtime_library_path: PathBuf,
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
}

fn default_embedding_model() -> String {
    ONNX_DEFAULTS.embedding_model_id.to_string()
}
fn default_embedding_dim() -> usize {
    ONNX_DEFAULTS.embedding_dimension
}
fn default_model_path() -> PathBuf {
    PathBuf::from(ONNX_DEFAULTS.model_path)
}
fn default_tokenizer_path() -> PathBuf {
    PathBuf::from(ONNX_DEFAULTS.tokenizer_path)
}
fn default_runtime_library_path() -> PathBuf {
    PathBuf::from(ONNX_DEFAULTS.runtime_library_path)
}
fn default_max_input_length() -> usize {
    ONNX_DEFAULTS.max_input_tokens
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::Auto,
            embedding_model: ONNX_DEFAULTS.embedding_model_id.to_string(),
            embedding_dim: ONNX_DEFAULTS.embedding_dimension,
            model_path: PathBuf::from(ONNX_DEFAULTS.model_path),
            tokenizer_path: PathBuf::from(ONNX_DEFAULTS.tokenizer_path),
            runtime_library_path: PathBuf::from(ONNX_DEFAULTS.runtime_library_path),
            max_input_length: ONNX_DEFAULTS.max_input_tokens,
        }
    }
}
