use std::path::Path;

use embedder::Embedder;
use store::Store;

use crate::error::EngineError;
use crate::{fuser, lexical, semantic};

/// `mode ∈ {lexical, semantic, hybrid}` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Lexical,
    Semantic,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SearchOptions {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub mode: SearchMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { top_k: default_top_k(), mode: SearchMode::default() }
    }
}

/// Per-mode score fields; unused fields are omitted on serialization so a
/// lexical result never carries a `cosine` key and vice versa (property 7).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScoreBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosine: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub path: String,
    pub heading_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub score_breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub count: usize,
    pub embedding_model: String,
    pub results: Vec<SearchResult>,
}

/// Runs the full search pipeline (§4.8): oversampled candidate generation
/// per enabled modality, fusion (hybrid only), result assembly, truncation
/// to `top_k`. Never raises on empty corpus, empty query, or an
/// unavailable embedder — those surface as an empty `results` list.
pub(crate) fn search(
    db_path: &Path,
    embedder: &dyn Embedder,
    rrf_k: f64,
    query: &str,
    opts: SearchOptions,
) -> Result<SearchResponse, EngineError> {
    if !(1..=100).contains(&opts.top_k) {
        return Err(EngineError::InvalidInput(format!("top_k must be within [1, 100], got {}", opts.top_k)));
    }
    let top_k = opts.top_k;
    let oversample = top_k * 2;

    let store = Store::open(db_path)?;

    let results = match opts.mode {
        SearchMode::Lexical => lexical_results(&store, query, oversample, top_k)?,
        SearchMode::Semantic => semantic_results(&store, embedder, query, oversample, top_k)?,
        SearchMode::Hybrid => hybrid_results(&store, embedder, rrf_k, query, oversample, top_k)?,
    };

    Ok(SearchResponse {
        query: query.to_string(),
        mode: opts.mode,
        count: results.len(),
        embedding_model: embedder.model_label().to_string(),
        results,
    })
}

fn lexical_results(store: &Store, query: &str, oversample: usize, top_k: usize) -> Result<Vec<SearchResult>, EngineError> {
    let hits = lexical::lexical(store, query, oversample)?;
    Ok(hits
        .into_iter()
        .take(top_k)
        .map(|h| SearchResult {
            chunk_id: h.chunk_id,
            path: h.path,
            heading_path: h.heading_path,
            chunk_index: h.chunk_index,
            content: h.content,
            score_breakdown: ScoreBreakdown { bm25: Some(h.bm25), ..Default::default() },
        })
        .collect())
}

fn semantic_results(
    store: &Store,
    embedder: &dyn Embedder,
    query: &str,
    oversample: usize,
    top_k: usize,
) -> Result<Vec<SearchResult>, EngineError> {
    let query_vector = embedder.embed_query(query);
    let hits = semantic::semantic(store, query_vector.as_deref(), oversample)?;
    let mut out = Vec::with_capacity(hits.len().min(top_k));
    for hit in hits.into_iter().take(top_k) {
        if let Some((chunk, path)) = store.get_chunk_with_path(&hit.chunk_id)? {
            out.push(SearchResult {
                chunk_id: hit.chunk_id,
                path,
                heading_path: chunk.heading_path,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                score_breakdown: ScoreBreakdown { cosine: Some(hit.cosine), ..Default::default() },
            });
        }
    }
    Ok(out)
}

fn hybrid_results(
    store: &Store,
    embedder: &dyn Embedder,
    rrf_k: f64,
    query: &str,
    oversample: usize,
    top_k: usize,
) -> Result<Vec<SearchResult>, EngineError> {
    let lex_hits = lexical::lexical(store, query, oversample)?;
    let query_vector = embedder.embed_query(query);
    let sem_hits = semantic::semantic(store, query_vector.as_deref(), oversample)?;

    let lex_order: Vec<String> = lex_hits.iter().map(|h| h.chunk_id.clone()).collect();
    let sem_order: Vec<String> = sem_hits.iter().map(|h| h.chunk_id.clone()).collect();
    let fused = fuser::fuse(&lex_order, &sem_order, rrf_k);

    let lex_meta: std::collections::HashMap<String, lexical::LexicalHit> =
        lex_hits.into_iter().map(|h| (h.chunk_id.clone(), h)).collect();

    let mut out = Vec::with_capacity(top_k);
    for f in fused.into_iter().take(top_k) {
        // Shared metadata always comes from one row: prefer the lexical
        // hit's own row (already in hand), else fetch once from the store.
        let (path, heading_path, chunk_index, content) = if let Some(h) = lex_meta.get(&f.chunk_id) {
            (h.path.clone(), h.heading_path.clone(), h.chunk_index, h.content.clone())
        } else if let Some((chunk, path)) = store.get_chunk_with_path(&f.chunk_id)? {
            (path, chunk.heading_path, chunk.chunk_index, chunk.content)
        } else {
            continue;
        };
        out.push(SearchResult {
            chunk_id: f.chunk_id,
            path,
            heading_path,
            chunk_index,
            content,
            score_breakdown: ScoreBreakdown {
                rrf: Some(f.fused_score),
                lexical_rank: f.lexical_rank,
                semantic_rank: f.semantic_rank,
                ..Default::default()
            },
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunker::ChunkParams;
    use embedder::{BackendMode, EmbedderConfig};

    fn seed(db_path: &Path) {
        let mut store = Store::open(db_path).unwrap();
        let embedder = embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() });
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\nthe quick fox jumps\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "# B\n\na lazy dog sleeps\n").unwrap();
        let opts = crate::indexer::ReindexOptions { include_globs: vec!["*.md".into()], ..Default::default() };
        crate::indexer::reindex(&mut store, embedder.as_ref(), ChunkParams::default(), &[dir.path().to_path_buf()], &opts).unwrap();
    }

    #[test]
    fn property6_top_k_bound_holds_for_every_mode() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("t.db");
        seed(&db_path);
        let embedder = embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() });

        for mode in [SearchMode::Lexical, SearchMode::Semantic, SearchMode::Hybrid] {
            let resp = search(&db_path, embedder.as_ref(), 60.0, "fox", SearchOptions { top_k: 1, mode }).unwrap();
            assert!(resp.results.len() <= 1);
        }
    }

    #[test]
    fn property7_mode_isolation_of_score_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("t.db");
        seed(&db_path);
        let embedder = embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() });

        let lex = search(&db_path, embedder.as_ref(), 60.0, "fox", SearchOptions { top_k: 10, mode: SearchMode::Lexical }).unwrap();
        assert!(lex.results.iter().all(|r| r.score_breakdown.cosine.is_none()));

        let sem = search(&db_path, embedder.as_ref(), 60.0, "fox", SearchOptions { top_k: 10, mode: SearchMode::Semantic }).unwrap();
        assert!(sem.results.iter().all(|r| r.score_breakdown.bm25.is_none()));

        let hyb = search(&db_path, embedder.as_ref(), 60.0, "fox", SearchOptions { top_k: 10, mode: SearchMode::Hybrid }).unwrap();
        assert!(hyb.results.iter().all(|r| r.score_breakdown.rrf.is_some()));
    }

    #[test]
    fn s4_semantic_with_no_embedder_returns_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("t.db");
        seed(&db_path);

        struct NoopEmbedder(embedder::EmbedderInfo);
        impl Embedder for NoopEmbedder {
            fn embed_documents(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, embedder::EmbedderError> {
                Ok(vec![])
            }
            fn embed_query(&self, _text: &str) -> Option<Vec<f32>> {
                None
            }
            fn info(&self) -> &embedder::EmbedderInfo {
                &self.0
            }
        }
        let embedder = NoopEmbedder(embedder::EmbedderInfo {
            provider: embedder::ProviderKind::DeterministicHash,
            model_label: "disabled".into(),
            dim: 8,
        });

        let resp = search(&db_path, &embedder, 60.0, "anything", SearchOptions { top_k: 10, mode: SearchMode::Semantic }).unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn rejects_out_of_range_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("t.db");
        seed(&db_path);
        let embedder = embedder::build_embedder(&EmbedderConfig { backend: BackendMode::Hash, embedding_dim: 8, ..EmbedderConfig::default() });
        let err = search(&db_path, embedder.as_ref(), 60.0, "fox", SearchOptions { top_k: 0, mode: SearchMode::Hybrid }).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
