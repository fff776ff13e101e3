//! File watcher (§4.10): debounced filesystem monitoring that submits
//! reindex jobs to the [`crate::background::BackgroundIndexer`]. Runs on
//! its own OS thread driving `notify-debouncer-full`'s blocking API —
//! deliberately not async, since the only thing waiting on it is itself.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};

use crate::background::BackgroundIndexer;
use crate::indexer::ReindexOptions;

const MAX_CONSECUTIVE_CRASHES: u32 = 5;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Stopped,
    Running,
    Crashed { consecutive_crashes: u32 },
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub paths: Vec<PathBuf>,
    pub debounce: Duration,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

pub struct FileWatcher {
    config: WatcherConfig,
    indexer: Arc<BackgroundIndexer>,
    state: Arc<Mutex<WatcherState>>,
    started: AtomicBool,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig, indexer: Arc<BackgroundIndexer>) -> Self {
        Self {
            config,
            indexer,
            state: Arc::new(Mutex::new(WatcherState::Stopped)),
            started: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state.lock().expect("watcher state lock poisoned").clone()
    }

    /// Starts the watcher thread on first call and is a no-op afterward —
    /// "the watcher begins on the first query after it is enabled, not at
    /// process start" (§4.10).
    pub fn ensure_started(&self) {
        if self.config.paths.is_empty() {
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = Arc::clone(&self.state);
        let cancel = Arc::clone(&self.cancel);
        let config = self.config.clone();
        let indexer = Arc::clone(&self.indexer);

        let handle = std::thread::Builder::new()
            .name("rifflux-file-watcher".into())
            .spawn(move || run_with_restart(config, indexer, state, cancel))
            .expect("spawn file watcher thread");
        *self.handle.lock().expect("watcher handle lock poisoned") = Some(handle);
    }

    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().expect("watcher handle lock poisoned").take() {
            let _ = handle.join();
        }
        *self.state.lock().expect("watcher state lock poisoned") = WatcherState::Stopped;
    }
}

fn run_with_restart(config: WatcherConfig, indexer: Arc<BackgroundIndexer>, state: Arc<Mutex<WatcherState>>, cancel: Arc<AtomicBool>) {
    let mut consecutive_crashes: u32 = 0;
    loop {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        *state.lock().expect("watcher state lock poisoned") = WatcherState::Running;

        match run_watch_session(&config, &indexer, &cancel) {
            Ok(()) => break, // clean shutdown via `stop()`
            Err(err) => {
                consecutive_crashes += 1;
                tracing::warn!(error = %err, consecutive_crashes, "file watcher session crashed");
                if consecutive_crashes >= MAX_CONSECUTIVE_CRASHES {
                    *state.lock().expect("watcher state lock poisoned") = WatcherState::Stopped;
                    break;
                }
                *state.lock().expect("watcher state lock poisoned") = WatcherState::Crashed { consecutive_crashes };
                std::thread::sleep(Duration::from_secs(1u64 << consecutive_crashes.min(5)));
            }
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// Runs one watch session until `cancel` is observed. Returns `Err` only on
/// a watcher-initialization failure (the crash-resilience path); a clean
/// `stop()` always returns `Ok(())`.
fn run_watch_session(config: &WatcherConfig, indexer: &Arc<BackgroundIndexer>, cancel: &Arc<AtomicBool>) -> Result<(), String> {
    let include = build_globset(&config.include_globs).map_err(|e| e.to_string())?;
    let exclude = build_globset(&config.exclude_globs).map_err(|e| e.to_string())?;

    let (tx, rx) = std::sync::mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(config.debounce, None, move |result| {
        let _ = tx.send(result);
    })
    .map_err(|e| e.to_string())?;

    for path in &config.paths {
        debouncer.watch(path, RecursiveMode::Recursive).map_err(|e| e.to_string())?;
    }

    loop {
        if cancel.load(Ordering::SeqCst) {
            return Ok(());
        }
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(events)) => {
                let matched: bool = events.iter().any(|event| {
                    event.paths.iter().any(|p| {
                        let rel = p.to_string_lossy();
                        let rel = chunk_model::normalize_path(&rel);
                        include.is_match(&rel) && !exclude.is_match(&rel)
                    })
                });
                if matched {
                    // The debounce batch collapses into one job per watched
                    // root; incremental reindex makes re-scanning cheap, and
                    // `submit` coalesces against any job already in flight
                    // for the same path set (§4.10).
                    let opts = ReindexOptions {
                        include_globs: config.include_globs.clone(),
                        exclude_globs: config.exclude_globs.clone(),
                        ..Default::default()
                    };
                    if let Err(err) = indexer.submit(config.paths.clone(), opts) {
                        tracing::warn!(error = %err, "failed to submit watcher-triggered reindex job");
                    }
                }
            }
            Ok(Err(errors)) => {
                tracing::warn!(?errors, "file watcher reported errors");
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err("watcher event channel disconnected".to_string());
            }
        }
    }
}
