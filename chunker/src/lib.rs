//! Deterministic text chunking: Markdown-aware when the source looks like
//! Markdown, falling back to paragraph splitting otherwise.

mod markdown;
mod params;
mod plain;

pub use chunk_model::ChunkRecord;
pub use markdown::chunk_markdown;
pub use params::ChunkParams;
pub use plain::chunk_plain_text;

/// Extensions treated as Markdown for chunking purposes.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

fn is_markdown_path(path: &str) -> bool {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    MARKDOWN_EXTENSIONS.contains(&ext.as_str())
}

/// Chunks `text` (already decoded to a `String`) according to its path
/// extension, using `params` as the size bounds. This is the single entry
/// point the indexer calls; it never touches the filesystem itself.
pub fn chunk_text(text: &str, path: &str, params: ChunkParams) -> Vec<ChunkRecord> {
    if is_markdown_path(path) {
        chunk_markdown(text, path, params)
    } else {
        chunk_plain_text(text, path, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_by_extension() {
        let md_chunks = chunk_text("# H\n\nbody\n", "a.md", ChunkParams { min_chunk_chars: 1, max_chunk_chars: 1000 });
        assert_eq!(md_chunks[0].heading_path, "H");

        let txt_chunks = chunk_text("body only\n", "a.txt", ChunkParams::default());
        assert_eq!(txt_chunks[0].heading_path, "");
    }
}
