//! Single-worker FIFO background indexer (§4.9). One dedicated OS thread
//! runs a small current-thread Tokio runtime so retries can `sleep` without
//! blocking anything else in the process; submissions themselves are a
//! plain synchronous call from any thread.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chunker::ChunkParams;
use embedder::Embedder;
use store::Store;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::indexer::{self, ReindexOptions, ReindexReport};

/// 1s, 2s, 4s — up to 3 retries (§4.9).
const RETRY_BACKOFFS_SECS: [u64; 3] = [1, 2, 4];
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    RetryWait { retries: u32 },
    Completed { report: ReindexReport },
    Failed { kind: String, retries: u32 },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobRecord {
    pub id: u64,
    pub locations: Vec<PathBuf>,
    pub status: JobStatus,
}

struct Job {
    id: u64,
    locations: Vec<PathBuf>,
    opts: ReindexOptions,
}

enum Command {
    Submit(Job),
    Shutdown { ack: std::sync::mpsc::Sender<()> },
}

pub struct BackgroundIndexer {
    tx: mpsc::UnboundedSender<Command>,
    jobs: Arc<Mutex<BTreeMap<u64, JobRecord>>>,
    next_id: AtomicU64,
    accepting: Arc<AtomicBool>,
    worker_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl BackgroundIndexer {
    pub fn spawn(db_path: PathBuf, embedder: Arc<dyn Embedder>, chunk_params: ChunkParams) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let jobs: Arc<Mutex<BTreeMap<u64, JobRecord>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let accepting = Arc::new(AtomicBool::new(true));

        let worker_jobs = Arc::clone(&jobs);
        let worker_accepting = Arc::clone(&accepting);
        let worker_thread = std::thread::Builder::new()
            .name("rifflux-background-indexer".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("background indexer runtime");
                runtime.block_on(worker_loop(rx, worker_jobs, worker_accepting, db_path, embedder, chunk_params));
            })
            .expect("spawn background indexer thread");

        Self {
            tx,
            jobs,
            next_id: AtomicU64::new(1),
            accepting,
            worker_thread: Mutex::new(Some(worker_thread)),
        }
    }

    /// Submits a reindex job. Coalesces against an existing queued/running
    /// job for the same normalized location set (§4.9's coalescing note)
    /// instead of enqueueing duplicate work.
    pub fn submit(&self, locations: Vec<PathBuf>, opts: ReindexOptions) -> Result<u64, EngineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::Internal("background indexer is shutting down".into()));
        }

        let normalized: Vec<String> = {
            let mut v: Vec<String> = locations.iter().map(|p| p.to_string_lossy().to_string()).collect();
            v.sort();
            v
        };

        let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
        for record in jobs.values() {
            let matches_state = matches!(record.status, JobStatus::Queued | JobStatus::Running | JobStatus::RetryWait { .. });
            if !matches_state {
                continue;
            }
            let mut existing: Vec<String> = record.locations.iter().map(|p| p.to_string_lossy().to_string()).collect();
            existing.sort();
            if existing == normalized {
                return Ok(record.id);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        jobs.insert(id, JobRecord { id, locations: locations.clone(), status: JobStatus::Queued });
        drop(jobs);

        let _ = self.tx.send(Command::Submit(Job { id, locations, opts }));
        Ok(id)
    }

    pub fn status(&self, job_id: u64) -> Option<JobRecord> {
        self.jobs.lock().expect("jobs lock poisoned").get(&job_id).cloned()
    }

    pub fn list(&self) -> Vec<JobRecord> {
        self.jobs.lock().expect("jobs lock poisoned").values().cloned().collect()
    }

    /// Rejects further submissions, fails any job still `Queued` with kind
    /// `shutdown`, lets a running job finish, then joins the worker thread
    /// (bounded by `timeout`).
    pub fn shutdown(&self, timeout: Duration) -> Result<(), EngineError> {
        self.accepting.store(false, Ordering::SeqCst);

        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        if self.tx.send(Command::Shutdown { ack: ack_tx }).is_err() {
            return Ok(()); // worker already gone
        }

        let acked = ack_rx.recv_timeout(timeout).is_ok();
        if let Some(handle) = self.worker_thread.lock().expect("worker thread lock poisoned").take() {
            if acked {
                let _ = handle.join();
            }
            // If the ack never arrived within `timeout`, the worker may
            // still be finishing a running job; we don't block the caller
            // further, matching "bounded by timeout" (§4.9).
        }
        Ok(())
    }
}

async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<Command>,
    jobs: Arc<Mutex<BTreeMap<u64, JobRecord>>>,
    accepting: Arc<AtomicBool>,
    db_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    chunk_params: ChunkParams,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Submit(job) => {
                // `Shutdown` is sent to the tail of this same FIFO channel,
                // so by the time it's dequeued every job submitted earlier
                // is already sitting ahead of it — `accepting` is the only
                // way to tell a not-yet-run queued job from one we should
                // actually execute. Only the job already `Running` when
                // shutdown begins is allowed to finish.
                if !accepting.load(Ordering::SeqCst) {
                    mark(&jobs, job.id, JobStatus::Failed { kind: "shutdown".into(), retries: 0 });
                    continue;
                }
                run_job_with_retry(job, &jobs, &db_path, &embedder, chunk_params).await;
            }
            Command::Shutdown { ack } => {
                // Any submissions still sitting in the channel (not yet
                // dequeued) are cancelled as failed, not silently dropped.
                while let Ok(cmd) = rx.try_recv() {
                    if let Command::Submit(job) = cmd {
                        mark(&jobs, job.id, JobStatus::Failed { kind: "shutdown".into(), retries: 0 });
                    }
                }
                let _ = ack.send(());
                break;
            }
        }
    }
}

async fn run_job_with_retry(
    job: Job,
    jobs: &Arc<Mutex<BTreeMap<u64, JobRecord>>>,
    db_path: &PathBuf,
    embedder: &Arc<dyn Embedder>,
    chunk_params: ChunkParams,
) {
    mark(jobs, job.id, JobStatus::Running);

    let mut retries = 0u32;
    loop {
        let db_path = db_path.clone();
        let locations = job.locations.clone();
        let opts = job.opts.clone();
        let embedder = Arc::clone(embedder);

        let outcome = tokio::task::spawn_blocking(move || -> Result<ReindexReport, EngineError> {
            let mut store = Store::open(&db_path)?;
            indexer::reindex(&mut store, embedder.as_ref(), chunk_params, &locations, &opts)
        })
        .await;

        match outcome {
            Ok(Ok(report)) => {
                mark(jobs, job.id, JobStatus::Completed { report });
                return;
            }
            Ok(Err(EngineError::Transient(_))) if retries < MAX_RETRIES => {
                retries += 1;
                mark(jobs, job.id, JobStatus::RetryWait { retries });
                tokio::time::sleep(Duration::from_secs(RETRY_BACKOFFS_SECS[retries as usize - 1])).await;
                mark(jobs, job.id, JobStatus::Running);
            }
            Ok(Err(e)) => {
                mark(jobs, job.id, JobStatus::Failed { kind: kind_name(&e).to_string(), retries });
                return;
            }
            Err(join_err) => {
                mark(jobs, job.id, JobStatus::Failed { kind: format!("internal: {join_err}"), retries });
                return;
            }
        }
    }
}

fn mark(jobs: &Arc<Mutex<BTreeMap<u64, JobRecord>>>, id: u64, status: JobStatus) {
    if let Some(record) = jobs.lock().expect("jobs lock poisoned").get_mut(&id) {
        record.status = status;
    }
}

fn kind_name(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotFound(_) => "not_found",
        EngineError::Transient(_) => "transient",
        EngineError::Schema(_) => "schema",
        EngineError::InvalidInput(_) => "invalid_input",
        EngineError::EmbedderUnavailable(_) => "embedder_unavailable",
        EngineError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedder::{BackendMode, EmbedderConfig};

    fn hash_embedder() -> Arc<dyn Embedder> {
        Arc::from(embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() }))
    }

    #[test]
    fn submit_runs_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\nbody\n").unwrap();
        let db_path = dir.path().join("db.sqlite");

        let indexer = BackgroundIndexer::spawn(db_path.clone(), hash_embedder(), ChunkParams::default());
        let opts = ReindexOptions { include_globs: vec!["*.md".into()], ..Default::default() };
        let job_id = indexer.submit(vec![dir.path().to_path_buf()], opts).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(record) = indexer.status(job_id) {
                if matches!(record.status, JobStatus::Completed { .. } | JobStatus::Failed { .. }) {
                    assert!(matches!(record.status, JobStatus::Completed { .. }));
                    break;
                }
            }
            assert!(std::time::Instant::now() < deadline, "job never completed");
            std::thread::sleep(Duration::from_millis(20));
        }

        indexer.shutdown(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn coalesces_duplicate_submission_for_same_locations() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let indexer = BackgroundIndexer::spawn(db_path, hash_embedder(), ChunkParams::default());

        let opts = ReindexOptions::default();
        let locations = vec![dir.path().to_path_buf()];
        let first = indexer.submit(locations.clone(), opts.clone()).unwrap();
        let second = indexer.submit(locations, opts).unwrap();
        assert_eq!(first, second);

        indexer.shutdown(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn shutdown_cancels_still_queued_jobs_instead_of_running_them() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\nbody\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "# B\n\nbody\n").unwrap();
        std::fs::write(dir.path().join("c.md"), "# C\n\nbody\n").unwrap();
        let db_path = dir.path().join("db.sqlite");

        let indexer = BackgroundIndexer::spawn(db_path, hash_embedder(), ChunkParams::default());
        let opts = ReindexOptions { include_globs: vec!["*.md".into()], ..Default::default() };

        // Three distinct-location submissions so coalescing doesn't merge
        // them into one job; the worker can only be running the first by
        // the time `shutdown` is called right behind it.
        let running = indexer.submit(vec![dir.path().join("a.md")], opts.clone()).unwrap();
        let queued_one = indexer.submit(vec![dir.path().join("b.md")], opts.clone()).unwrap();
        let queued_two = indexer.submit(vec![dir.path().join("c.md")], opts).unwrap();

        indexer.shutdown(Duration::from_secs(5)).unwrap();

        let running_status = indexer.status(running).unwrap().status;
        assert!(
            matches!(running_status, JobStatus::Completed { .. } | JobStatus::Failed { .. }),
            "the job already running at shutdown time should still be allowed to finish, got {running_status:?}"
        );

        for id in [queued_one, queued_two] {
            let status = indexer.status(id).unwrap().status;
            assert!(
                matches!(&status, JobStatus::Failed { kind, .. } if kind == "shutdown"),
                "still-queued job {id} should be cancelled as failed(shutdown), got {status:?}"
            );
        }
    }

    #[test]
    fn shutdown_rejects_further_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let indexer = BackgroundIndexer::spawn(db_path, hash_embedder(), ChunkParams::default());
        indexer.shutdown(Duration::from_secs(5)).unwrap();

        let err = indexer.submit(vec![dir.path().to_path_buf()], ReindexOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }
}
