use std::time::Duration;

use engine::{Engine, EngineConfig, ReindexRequest, SearchOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run -p engine --example ingest_and_search -- <DIR> <QUERY>");
        std::process::exit(1);
    }
    let dir = &args[1];
    let query = &args[2];

    let config = EngineConfig { db_path: std::env::temp_dir().join("rifflux-example.db"), ..EngineConfig::default() };
    let engine = Engine::init(config)?;

    let report = engine.reindex(ReindexRequest { path: Some(dir.clone()), ..Default::default() })?;
    println!("indexed {} files ({} skipped, {} deleted)", report.indexed_files, report.skipped_files, report.deleted_files);

    let response = engine.search(query, SearchOptions::default())?;
    println!("Results: {}", response.count);
    for (i, r) in response.results.iter().enumerate() {
        let preview: String = r.content.chars().take(80).collect();
        println!("{:>2}. [{}] {} {}", i + 1, r.chunk_id, r.path, preview);
    }

    engine.shutdown(Duration::from_secs(5))?;
    Ok(())
}
