//! The top-level `rifflux` aggregate: wires Store, Chunker, Embedder,
//! Indexer, Search Service, Background Indexer, and File Watcher into one
//! handle with an `init -> serve -> shutdown` lifecycle (§9's redesign
//! note). Owns no long-lived database connection itself — `Store::open` is
//! cheap and reopened per call (mirrors the teacher's `open_repo` pattern)
//! so WAL readers never block the writer.

pub mod background;
pub mod config;
pub mod error;
mod fuser;
mod git_fingerprint;
pub mod indexer;
mod lexical;
mod semantic;
pub mod service;
pub mod watcher;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use background::{BackgroundIndexer, JobRecord, JobStatus};
pub use chunk_model::{ChunkRecord, FileRecord};
pub use config::EngineConfig;
use embedder::Embedder;
pub use error::EngineError;
pub use indexer::{ReindexOptions, ReindexReport};
pub use service::{ScoreBreakdown, SearchMode, SearchOptions, SearchResponse, SearchResult};
use store::Store;
pub use watcher::WatcherState;
use watcher::{FileWatcher, WatcherConfig};

/// One handle per process, constructed once via [`Engine::init`], serving
/// `search`/`reindex`/read calls until [`Engine::shutdown`].
pub struct Engine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    background: Arc<BackgroundIndexer>,
    watcher: FileWatcher,
    last_auto_reindex: Mutex<Option<Instant>>,
}

impl Engine {
    /// Opens (creating if absent) the database and schema, builds the
    /// configured embedder, and spawns the background worker. The file
    /// watcher thread is not started here — it starts lazily on the first
    /// query if `file_watcher` is enabled (§4.10).
    pub fn init(config: EngineConfig) -> Result<Self, EngineError> {
        let _ = Store::open(&config.db_path)?;

        let embedder: Arc<dyn Embedder> = Arc::from(embedder::build_embedder(&config.embedder));
        let background = Arc::new(BackgroundIndexer::spawn(config.db_path.clone(), Arc::clone(&embedder), config.chunk_params));

        let watcher_config = WatcherConfig {
            paths: config.file_watcher_paths.clone(),
            debounce: Duration::from_millis(config.file_watcher_debounce_ms),
            include_globs: config.include_globs.clone(),
            exclude_globs: config.exclude_globs.clone(),
        };
        let watcher = FileWatcher::new(watcher_config, Arc::clone(&background));

        Ok(Self { config, embedder, background, watcher, last_auto_reindex: Mutex::new(None) })
    }

    /// Lazily starts the file watcher if `file_watcher` is enabled in the
    /// configuration; a no-op on every call after the first.
    pub fn ensure_watching(&self) {
        if self.config.file_watcher {
            self.watcher.ensure_started();
        }
    }

    /// If `auto_reindex_on_search` is enabled, submits a background reindex
    /// of `auto_reindex_paths` at most once per
    /// `auto_reindex_min_interval_seconds` (§6). Fire-and-forget: the query
    /// actor never waits on the submitted job, and `submit`'s own coalescing
    /// keeps a burst of concurrent searches from queuing duplicate work.
    fn maybe_auto_reindex(&self) {
        if !self.config.auto_reindex_on_search || self.config.auto_reindex_paths.is_empty() {
            return;
        }
        let min_interval = Duration::from_secs_f64(self.config.auto_reindex_min_interval_seconds.max(0.0));
        let mut last = self.last_auto_reindex.lock().expect("auto-reindex timer lock poisoned");
        let due = match *last {
            None => true,
            Some(prev) => prev.elapsed() >= min_interval,
        };
        if !due {
            return;
        }
        *last = Some(Instant::now());
        drop(last);

        let opts = ReindexOptions {
            force: false,
            prune_missing: true,
            include_globs: self.config.include_globs.clone(),
            exclude_globs: self.config.exclude_globs.clone(),
        };
        if let Err(err) = self.background.submit(self.config.auto_reindex_paths.clone(), opts) {
            tracing::warn!(error = %err, "failed to submit auto-reindex-on-search job");
        }
    }

    /// `search(query, { top_k, mode }) -> results` (§4.8).
    pub fn search(&self, query: &str, opts: SearchOptions) -> Result<SearchResponse, EngineError> {
        self.ensure_watching();
        self.maybe_auto_reindex();
        service::search(&self.config.db_path, self.embedder.as_ref(), self.config.rrf_k, query, opts)
    }

    /// Runs a reindex synchronously against the tool-facing contract
    /// (§6): precedence is non-empty `paths` > `path` > current working
    /// directory.
    pub fn reindex(&self, request: ReindexRequest) -> Result<ReindexResponse, EngineError> {
        let locations = resolve_locations(&request)?;
        let opts = ReindexOptions {
            force: request.force,
            prune_missing: request.prune_missing,
            include_globs: self.config.include_globs.clone(),
            exclude_globs: self.config.exclude_globs.clone(),
        };
        let mut store = Store::open(&self.config.db_path)?;
        let report = indexer::reindex(&mut store, self.embedder.as_ref(), self.config.chunk_params, &locations, &opts)?;
        Ok(ReindexResponse {
            indexed_files: report.indexed_files,
            skipped_files: report.skipped_files,
            deleted_files: report.deleted_files,
            indexed_paths: Some(locations.iter().map(|p| p.display().to_string()).collect()),
            embedding_model: self.embedder.model_label().to_string(),
            embedding_backend: provider_label(self.embedder.info().provider),
            git_fingerprint: report.git_fingerprint,
        })
    }

    /// Submits the same reindex request to the background worker instead
    /// of running it inline; returns the job id immediately.
    pub fn reindex_background(&self, request: ReindexRequest) -> Result<u64, EngineError> {
        let locations = resolve_locations(&request)?;
        let opts = ReindexOptions {
            force: request.force,
            prune_missing: request.prune_missing,
            include_globs: self.config.include_globs.clone(),
            exclude_globs: self.config.exclude_globs.clone(),
        };
        self.background.submit(locations, opts)
    }

    pub fn job_status(&self, job_id: u64) -> Option<JobRecord> {
        self.background.status(job_id)
    }

    pub fn list_jobs(&self) -> Vec<JobRecord> {
        self.background.list()
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<ChunkRecord, EngineError> {
        let store = Store::open(&self.config.db_path)?;
        store.get_chunk(chunk_id)?.ok_or_else(|| EngineError::NotFound(chunk_id.to_string()))
    }

    pub fn get_file(&self, path: &str) -> Result<FileRecord, EngineError> {
        let store = Store::open(&self.config.db_path)?;
        store.get_file(path)?.ok_or_else(|| EngineError::NotFound(path.to_string()))
    }

    pub fn index_status(&self) -> Result<IndexStatus, EngineError> {
        let store = Store::open(&self.config.db_path)?;
        let (file_count, chunk_count) = store.counts()?;
        Ok(IndexStatus {
            file_count,
            chunk_count,
            embedding_model: store.get_metadata(chunk_model::metadata_keys::EMBEDDING_MODEL)?,
            embedding_dim: store.get_metadata(chunk_model::metadata_keys::EMBEDDING_DIM)?,
            watcher_state: self.watcher.state(),
        })
    }

    /// Releases everything on all exit paths: watcher stop, background
    /// worker drain, WAL checkpoint — bounded by `timeout` (§9).
    pub fn shutdown(&self, timeout: Duration) -> Result<(), EngineError> {
        self.watcher.stop();
        self.background.shutdown(timeout)?;
        let store = Store::open(&self.config.db_path)?;
        store.checkpoint_wal()?;
        Ok(())
    }
}

fn provider_label(provider: embedder::ProviderKind) -> String {
    match provider {
        embedder::ProviderKind::OnnxNeural => "onnx-like".to_string(),
        embedder::ProviderKind::DeterministicHash => "hash".to_string(),
    }
}

/// Reindex tool input (§6). `paths` takes precedence over `path`, which
/// takes precedence over the current working directory.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ReindexRequest {
    pub path: Option<String>,
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_prune_missing")]
    pub prune_missing: bool,
}

fn default_prune_missing() -> bool {
    true
}

/// Reindex tool output (§6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReindexResponse {
    pub indexed_files: u64,
    pub skipped_files: u64,
    pub deleted_files: u64,
    pub indexed_paths: Option<Vec<String>>,
    pub embedding_model: String,
    pub embedding_backend: String,
    pub git_fingerprint: Option<String>,
}

/// `index_status()` output: a thin read tool over the store's counts and
/// metadata, plus the watcher's current state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStatus {
    pub file_count: i64,
    pub chunk_count: i64,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<String>,
    pub watcher_state: WatcherState,
}

fn resolve_locations(request: &ReindexRequest) -> Result<Vec<PathBuf>, EngineError> {
    if let Some(paths) = &request.paths {
        if !paths.is_empty() {
            return Ok(paths.iter().map(PathBuf::from).collect());
        }
    }
    if let Some(path) = &request.path {
        if !path.trim().is_empty() {
            return Ok(vec![PathBuf::from(path)]);
        }
    }
    std::env::current_dir()
        .map(|dir| vec![dir])
        .map_err(|e| EngineError::Internal(format!("could not resolve current directory: {e}")))
}
