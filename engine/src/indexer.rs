use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chunk_model::metadata_keys;
use chunker::ChunkParams;
use embedder::Embedder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use store::{NewChunk, NewEmbedding, NewFile, Store};

use crate::error::EngineError;
use crate::git_fingerprint;

#[derive(Debug, Clone)]
pub struct ReindexOptions {
    pub force: bool,
    pub prune_missing: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            force: false,
            prune_missing: true,
            include_globs: vec!["*.md".to_string()],
            exclude_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReindexReport {
    pub indexed_files: u64,
    pub skipped_files: u64,
    pub deleted_files: u64,
    pub git_fingerprint: Option<String>,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| EngineError::InvalidInput(format!("bad glob {pattern}: {e}")))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| EngineError::InvalidInput(e.to_string()))
}

fn scan_location(root: &Path, include: &GlobSet, exclude: &GlobSet) -> Vec<(PathBuf, String)> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel_str = chunk_model::normalize_path(&rel.to_string_lossy());
        if !include.is_match(&rel_str) {
            continue;
        }
        if exclude.is_match(&rel_str) {
            continue;
        }
        out.push((path.to_path_buf(), rel_str));
    }
    out
}

fn file_stat(path: &Path) -> std::io::Result<(i64, i64)> {
    let meta = fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok((mtime_ns, meta.len() as i64))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Runs the full scan -> change-detect -> chunk -> embed -> persist pipeline
/// for every location in `locations`, then prunes and updates metadata.
pub fn reindex(
    store: &mut Store,
    embedder: &dyn Embedder,
    chunk_params: ChunkParams,
    locations: &[PathBuf],
    opts: &ReindexOptions,
) -> Result<ReindexReport, EngineError> {
    let include = build_globset(&opts.include_globs)?;
    let exclude = build_globset(&opts.exclude_globs)?;

    let mut report = ReindexReport::default();
    let mut observed_paths: HashSet<String> = HashSet::new();
    let mut seen_absolute: HashSet<PathBuf> = HashSet::new();

    for root in locations {
        if let Some(fp) = git_fingerprint::fingerprint_for(root) {
            let root_key = sha256_hex(root.to_string_lossy().as_bytes());
            store.set_metadata(&format!("{}:{}", metadata_keys::GIT_FINGERPRINT_PREFIX, root_key), &fp)?;
            report.git_fingerprint = Some(fp);
        }

        for (abs_path, rel_path) in scan_location(root, &include, &exclude) {
            let canonical = abs_path.canonicalize().unwrap_or(abs_path.clone());
            if !seen_absolute.insert(canonical) {
                continue; // already indexed via an overlapping scan location
            }
            observed_paths.insert(rel_path.clone());

            let (mtime_ns, size_bytes) = match file_stat(&abs_path) {
                Ok(stat) => stat,
                Err(e) => {
                    tracing::warn!(path = %rel_path, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let stored = store.get_file(&rel_path)?;

            let needs_rebuild = match &stored {
                None => true,
                Some(_) if opts.force => true,
                Some(existing) if existing.mtime_ns == mtime_ns && existing.size_bytes == size_bytes => false,
                // mtime/size changed: fall through to hash comparison below
                Some(_) => true,
            };

            if !needs_rebuild {
                report.skipped_files += 1;
                continue;
            }

            let bytes = match fs::read(&abs_path) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(path = %rel_path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let hash = sha256_hex(&bytes);

            if let Some(existing) = &stored {
                if !opts.force && existing.sha256 == hash {
                    store.touch_file(&rel_path, mtime_ns, size_bytes)?;
                    report.skipped_files += 1;
                    continue;
                }
            }

            let text = String::from_utf8_lossy(&bytes).to_string();
            let chunks = chunker::chunk_text(&text, &rel_path, chunk_params);
            let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
            let vectors = embedder.embed_documents(&texts)?;

            let new_chunks: Vec<NewChunk> = chunks
                .iter()
                .map(|c| NewChunk {
                    chunk_id: c.chunk_id.clone(),
                    chunk_index: c.chunk_index,
                    heading_path: c.heading_path.clone(),
                    content: c.content.clone(),
                    token_count: c.token_count,
                })
                .collect();

            let new_embeddings: Vec<NewEmbedding> = chunks
                .iter()
                .zip(vectors.into_iter())
                .map(|(c, vec)| NewEmbedding {
                    chunk_id: c.chunk_id.clone(),
                    model: embedder.model_label().to_string(),
                    dim: embedder.dim() as u32,
                    vec,
                })
                .collect();

            let new_file = NewFile { path: rel_path.clone(), mtime_ns, size_bytes, sha256: hash };
            store.rebuild_file(new_file, new_chunks, new_embeddings)?;
            report.indexed_files += 1;
        }
    }

    if opts.prune_missing {
        for stored_path in store.list_file_paths()? {
            if !observed_paths.contains(&stored_path) {
                store.delete_file(&stored_path)?;
                report.deleted_files += 1;
            }
        }
    }

    store.set_metadata(metadata_keys::EMBEDDING_MODEL, embedder.model_label())?;
    store.set_metadata(metadata_keys::EMBEDDING_DIM, &embedder.dim().to_string())?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedder::{BackendMode, EmbedderConfig};

    fn hash_embedder() -> Box<dyn Embedder> {
        embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() })
    }

    #[test]
    fn s5_incremental_skip_on_mtime_only_change() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("f{i}.md")), format!("# H{i}\n\nbody {i}\n")).unwrap();
        }
        let mut store = Store::open_in_memory().unwrap();
        let embedder = hash_embedder();
        let opts = ReindexOptions { include_globs: vec!["*.md".into()], ..ReindexOptions::default() };

        let first = reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
        assert_eq!(first.indexed_files, 10);
        assert_eq!(first.skipped_files, 0);

        // bump mtime only, keep bytes identical
        let touched = dir.path().join("f0.md");
        let content = std::fs::read(&touched).unwrap();
        std::fs::write(&touched, content).unwrap();
        filetime_bump(&touched);

        let second = reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
        assert_eq!(second.indexed_files, 0);
        assert_eq!(second.skipped_files, 10);
    }

    fn filetime_bump(path: &Path) {
        let now = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(now).unwrap();
    }

    #[test]
    fn s6_prune_missing_deletes_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.md");
        std::fs::write(&path, "# Keep\n\nhello\n").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = hash_embedder();
        let opts = ReindexOptions { include_globs: vec!["*.md".into()], ..ReindexOptions::default() };
        reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();

        std::fs::remove_file(&path).unwrap();
        let report = reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
        assert_eq!(report.deleted_files, 1);
        assert!(store.get_file("keep.md").unwrap().is_none());
    }

    #[test]
    fn idempotent_reindex_on_unchanged_corpus() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\nbody\n").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let embedder = hash_embedder();
        let opts = ReindexOptions { include_globs: vec!["*.md".into()], ..ReindexOptions::default() };
        reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
        let second = reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
        assert_eq!(second.indexed_files, 0);
    }
}
