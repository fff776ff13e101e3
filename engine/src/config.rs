use std::path::PathBuf;

use chunker::ChunkParams;
use embedder::EmbedderConfig;

/// The full recognized configuration surface (§6). Loading this from
/// environment variables or CLI flags is out of scope; callers construct it
/// directly or via `serde` from whatever configuration format they use.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,

    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,

    #[serde(default)]
    pub auto_reindex_on_search: bool,

    #[serde(default)]
    pub auto_reindex_paths: Vec<PathBuf>,

    #[serde(default = "default_auto_reindex_interval")]
    pub auto_reindex_min_interval_seconds: f64,

    #[serde(default)]
    pub file_watcher: bool,

    #[serde(default)]
    pub file_watcher_paths: Vec<PathBuf>,

    #[serde(default = "default_debounce_ms")]
    pub file_watcher_debounce_ms: u64,

    #[serde(default)]
    pub chunk_params: ChunkParams,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".tmp/rifflux/rifflux.db")
}

fn default_include_globs() -> Vec<String> {
    vec!["*.md".to_string()]
}

fn default_exclude_globs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.tmp/**".to_string(),
    ]
}

fn default_auto_reindex_interval() -> f64 {
    2.0
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_rrf_k() -> f64 {
    60.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderConfig::default(),
            db_path: default_db_path(),
            include_globs: default_include_globs(),
            exclude_globs: default_exclude_globs(),
            auto_reindex_on_search: false,
            auto_reindex_paths: Vec::new(),
            auto_reindex_min_interval_seconds: default_auto_reindex_interval(),
            file_watcher: false,
            file_watcher_paths: Vec::new(),
            file_watcher_debounce_ms: default_debounce_ms(),
            chunk_params: ChunkParams::default(),
            rrf_k: default_rrf_k(),
        }
    }
}
