/// Size bounds governing chunk emission.
///
/// Mirrors the defaults documented for the engine's `embedding_dim`-style
/// configuration surface: small enough to tune per corpus, but sane out
/// of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct ChunkParams {
    pub min_chunk_chars: usize,
    pub max_chunk_chars: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            min_chunk_chars: 200,
            max_chunk_chars: 1200,
        }
    }
}
