use std::time::Duration;

use embedder::{BackendMode, EmbedderConfig};
use engine::{Engine, EngineConfig, ReindexRequest, SearchMode, SearchOptions};

fn config(db_path: std::path::PathBuf) -> EngineConfig {
    EngineConfig {
        db_path,
        embedder: EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 16, ..Default::default() },
        include_globs: vec!["*.md".to_string()],
        ..Default::default()
    }
}

/// Full lifecycle over a small corpus: index, search in every mode, edit a
/// file and reindex incrementally, delete a file and prune, then shut down
/// cleanly. Exercises properties 3-10 and scenarios S3-S6 together rather
/// than in isolation.
#[test]
fn full_lifecycle_index_search_edit_prune_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.md"), "# Alpha\n\nThe quick brown fox jumps over the lazy dog.\n").unwrap();
    std::fs::write(dir.path().join("beta.md"), "# Beta\n\nRust makes systems programming safer.\n").unwrap();

    let db_path = dir.path().join("rifflux.db");
    let engine = Engine::init(config(db_path)).unwrap();

    let report = engine
        .reindex(ReindexRequest { paths: Some(vec![dir.path().display().to_string()]), ..Default::default() })
        .unwrap();
    assert_eq!(report.indexed_files, 2);
    assert_eq!(report.skipped_files, 0);

    let hybrid = engine.search("fox", SearchOptions { top_k: 5, mode: SearchMode::Hybrid }).unwrap();
    assert!(hybrid.results.iter().any(|r| r.path == "alpha.md"));

    let lexical = engine.search("fox", SearchOptions { top_k: 5, mode: SearchMode::Lexical }).unwrap();
    assert!(lexical.results.iter().any(|r| r.path == "alpha.md"));

    let semantic = engine.search("fox", SearchOptions { top_k: 5, mode: SearchMode::Semantic }).unwrap();
    assert!(semantic.results.len() <= 5);

    let idempotent = engine
        .reindex(ReindexRequest { paths: Some(vec![dir.path().display().to_string()]), ..Default::default() })
        .unwrap();
    assert_eq!(idempotent.indexed_files, 0);
    assert_eq!(idempotent.skipped_files, 2);

    std::fs::write(dir.path().join("alpha.md"), "# Alpha\n\nThe quick brown fox jumps over a sleepy cat.\n").unwrap();
    let edited = engine
        .reindex(ReindexRequest { paths: Some(vec![dir.path().display().to_string()]), ..Default::default() })
        .unwrap();
    assert_eq!(edited.indexed_files, 1);
    assert_eq!(edited.skipped_files, 1);

    std::fs::remove_file(dir.path().join("beta.md")).unwrap();
    let pruned = engine
        .reindex(ReindexRequest { paths: Some(vec![dir.path().display().to_string()]), prune_missing: true, ..Default::default() })
        .unwrap();
    assert_eq!(pruned.deleted_files, 1);
    assert!(engine.get_file("beta.md").is_err());
    assert!(engine.get_file("alpha.md").is_ok());

    let status = engine.index_status().unwrap();
    assert_eq!(status.file_count, 1);

    engine.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn background_reindex_job_reaches_completed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "# A\n\nhello background indexing\n").unwrap();

    let db_path = dir.path().join("rifflux.db");
    let engine = Engine::init(config(db_path)).unwrap();

    let job_id = engine
        .reindex_background(ReindexRequest { paths: Some(vec![dir.path().display().to_string()]), ..Default::default() })
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = engine.job_status(job_id) {
            if !matches!(record.status, engine::JobStatus::Queued | engine::JobStatus::Running) {
                break;
            }
        }
        assert!(std::time::Instant::now() < deadline, "background job never finished");
        std::thread::sleep(Duration::from_millis(20));
    }

    let response = engine.search("background", SearchOptions::default()).unwrap();
    assert!(!response.results.is_empty());

    engine.shutdown(Duration::from_secs(5)).unwrap();
}
