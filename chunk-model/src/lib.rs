//! Shared models used across crates.

use std::fmt;

/// A tracked source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Stable numeric id, assigned by the store.
    pub id: i64,
    /// Canonical relative path, unique within a corpus.
    pub path: String,
    /// Last known modification time, nanoseconds since epoch.
    pub mtime_ns: i64,
    /// Byte size at last index.
    pub size_bytes: i64,
    /// SHA-256 content hash, hex encoded.
    pub sha256: String,
}

/// A single retrievable text unit derived from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Stable numeric id, assigned by the store.
    pub id: i64,
    /// Opaque, globally unique id: `sha256(normalized_path || "::" || chunk_index)`.
    pub chunk_id: String,
    /// Owning file id.
    pub file_id: i64,
    /// 0-based position within the file.
    pub chunk_index: u32,
    /// `" > "`-joined ancestor heading breadcrumb; empty before the first heading.
    pub heading_path: String,
    /// Text payload.
    pub content: String,
    /// Approximate, advisory token count.
    pub token_count: u32,
}

/// A dense vector embedding for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub model: String,
    pub dim: u32,
    pub vec: Vec<f32>,
    /// RFC3339 timestamp.
    pub updated_at: String,
}

/// A single `key -> value` row in `index_metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub key: String,
    pub value: String,
    /// RFC3339 timestamp.
    pub updated_at: String,
}

/// Well-known metadata keys written by the indexer.
pub mod metadata_keys {
    pub const EMBEDDING_MODEL: &str = "embedding_model";
    pub const EMBEDDING_DIM: &str = "embedding_dim";
    pub const GIT_FINGERPRINT_PREFIX: &str = "git_fingerprint";
}

/// Normalizes a relative path for use in `chunk_id` derivation and file
/// identity comparisons: forward slashes, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    replaced.strip_prefix("./").unwrap_or(&replaced).to_string()
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.path, self.size_bytes)
    }
}

impl FileRecord {
    pub fn new(path: impl Into<String>, mtime_ns: i64, size_bytes: i64, sha256: impl Into<String>) -> Self {
        Self {
            id: 0,
            path: path.into(),
            mtime_ns,
            size_bytes,
            sha256: sha256.into(),
        }
    }
}

impl ChunkRecord {
    pub fn new(
        chunk_id: impl Into<String>,
        file_id: i64,
        chunk_index: u32,
        heading_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let token_count = content.split_whitespace().count() as u32;
        Self {
            id: 0,
            chunk_id: chunk_id.into(),
            file_id,
            chunk_index,
            heading_path: heading_path.into(),
            content,
            token_count,
        }
    }
}
