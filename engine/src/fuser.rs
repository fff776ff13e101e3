use std::cmp::Ordering;
use std::collections::HashMap;

/// One fused candidate: `rank` fields are `None` when the chunk did not
/// appear in that modality's list at all (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub chunk_id: String,
    pub fused_score: f64,
    pub lexical_rank: Option<u32>,
    pub semantic_rank: Option<u32>,
}

/// Reciprocal Rank Fusion over two rank-ordered id lists (rank starts at 1).
/// `fused(c) = sum(1 / (k + rank_i))` over the lists c appears in; absent
/// lists contribute 0. Sorted strictly descending by `fused_score`, with a
/// stable tie-break: first-seen-in-L, then first-seen-in-S, then
/// lexicographic by chunk_id. Never averages raw modality scores.
pub fn fuse(lexical_order: &[String], semantic_order: &[String], k: f64) -> Vec<FusedHit> {
    let lex_rank: HashMap<&str, u32> = lexical_order.iter().map(String::as_str).zip(1u32..).collect();
    let sem_rank: HashMap<&str, u32> = semantic_order.iter().map(String::as_str).zip(1u32..).collect();

    // First-seen order across L then S fixes the tie-break priority: a
    // chunk's position here already reflects "earlier in L, else earlier
    // in S" before any lexicographic fallback is needed.
    let mut first_seen: Vec<&str> = Vec::with_capacity(lexical_order.len() + semantic_order.len());
    for id in lexical_order.iter().chain(semantic_order.iter()) {
        if !first_seen.contains(&id.as_str()) {
            first_seen.push(id.as_str());
        }
    }
    let order_index: HashMap<&str, usize> = first_seen.iter().copied().zip(0usize..).collect();

    let mut hits: Vec<FusedHit> = first_seen
        .iter()
        .map(|&id| {
            let lr = lex_rank.get(id).copied();
            let sr = sem_rank.get(id).copied();
            let score = lr.map(|r| 1.0 / (k + r as f64)).unwrap_or(0.0) + sr.map(|r| 1.0 / (k + r as f64)).unwrap_or(0.0);
            FusedHit { chunk_id: id.to_string(), fused_score: score, lexical_rank: lr, semantic_rank: sr }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| order_index[a.chunk_id.as_str()].cmp(&order_index[b.chunk_id.as_str()]))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_hybrid_rrf_fusion() {
        let lexical = vec!["c1".to_string(), "c2".to_string()];
        let semantic = vec!["c2".to_string(), "c3".to_string()];
        let hits = fuse(&lexical, &semantic, 60.0);

        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1", "c3"]);

        let c2 = &hits[0];
        assert_eq!(c2.lexical_rank, Some(2));
        assert_eq!(c2.semantic_rank, Some(1));
        assert!((c2.fused_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-9);

        let c1 = &hits[1];
        assert_eq!(c1.lexical_rank, Some(1));
        assert_eq!(c1.semantic_rank, None);
        assert!((c1.fused_score - 1.0 / 61.0).abs() < 1e-9);

        let c3 = &hits[2];
        assert_eq!(c3.lexical_rank, None);
        assert_eq!(c3.semantic_rank, Some(2));
        assert!((c3.fused_score - 1.0 / 62.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        assert!(fuse(&[], &[], 60.0).is_empty());
    }

    #[test]
    fn tie_break_falls_back_to_lexicographic_chunk_id() {
        // Neither list contains these ids (e.g. degenerate both-empty rank
        // sets would never happen in practice), but equal fused_score with
        // no L/S membership at all can't occur; instead verify that two
        // chunks tied in score purely via symmetric placement still sort
        // deterministically by first-seen order.
        let lexical = vec!["zzz".to_string(), "aaa".to_string()];
        let semantic = vec![];
        let hits = fuse(&lexical, &semantic, 60.0);
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["zzz", "aaa"]);
    }
}
