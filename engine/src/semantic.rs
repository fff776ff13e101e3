use std::cmp::Ordering;

use store::Store;

use crate::error::EngineError;

/// One semantic hit: a chunk id plus its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub cosine: f32,
}

/// `semantic(query_vector | none, limit) -> ordered list<(chunk_id, cosine)>`
/// (§4.6). `None` means the embedder was unavailable for this query: return
/// an empty list rather than erroring.
pub fn semantic(store: &Store, query_vector: Option<&[f32]>, limit: usize) -> Result<Vec<SemanticHit>, EngineError> {
    let Some(query_vector) = query_vector else {
        return Ok(Vec::new());
    };

    let mut scored: Vec<SemanticHit> = store
        .iter_embeddings()?
        .into_iter()
        .map(|(chunk_id, vec)| SemanticHit { chunk_id, cosine: cosine_similarity(query_vector, &vec) })
        .collect();

    scored.sort_by(|a, b| b.cosine.partial_cmp(&a.cosine).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// `(a·b) / (||a||·||b||)`. A zero norm on either side, or a dimension
/// mismatch, yields `0.0` rather than panicking (§4.6).
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
