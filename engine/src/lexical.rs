use store::{FtsHit, Store};

use crate::error::EngineError;

/// One lexical hit, already carrying the metadata needed for result
/// assembly so the search service never has to join back to the store for
/// lexical-only results (§4.5).
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub path: String,
    pub heading_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub bm25: f64,
}

impl From<FtsHit> for LexicalHit {
    fn from(hit: FtsHit) -> Self {
        Self {
            chunk_id: hit.chunk.chunk_id,
            path: hit.path,
            heading_path: hit.chunk.heading_path,
            chunk_index: hit.chunk.chunk_index,
            content: hit.chunk.content,
            bm25: hit.bm25,
        }
    }
}

/// `lexical(query, limit) -> ordered list<(chunk_id, bm25)>` (§4.5). Already
/// ordered ascending by raw BM25 (rank 1 = best) by the store's query.
pub fn lexical(store: &Store, query: &str, limit: usize) -> Result<Vec<LexicalHit>, EngineError> {
    let hits = store.search_fts(query, limit)?;
    Ok(hits.into_iter().map(LexicalHit::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{NewChunk, NewFile};

    fn seeded_store() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        let file = NewFile { path: "a.md".into(), mtime_ns: 1, size_bytes: 1, sha256: "h".into() };
        let chunks = vec![
            NewChunk { chunk_id: "c0".into(), chunk_index: 0, heading_path: "A".into(), content: "the quick fox".into(), token_count: 3 },
            NewChunk { chunk_id: "c1".into(), chunk_index: 1, heading_path: "B".into(), content: "a lazy dog".into(), token_count: 3 },
        ];
        store.rebuild_file(file, chunks, vec![]).unwrap();
        store
    }

    #[test]
    fn returns_ranked_hits_with_metadata() {
        let store = seeded_store();
        let hits = lexical(&store, "fox", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c0");
        assert_eq!(hits[0].path, "a.md");
        assert_eq!(hits[0].heading_path, "A");
    }

    #[test]
    fn blank_query_is_empty_not_an_error() {
        let store = seeded_store();
        assert!(lexical(&store, "   ", 10).unwrap().is_empty());
    }
}
