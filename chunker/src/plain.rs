use chunk_model::{normalize_path, ChunkRecord};
use sha2::{Digest, Sha256};

use crate::params::ChunkParams;

fn chunk_id_for(normalized_path: &str, index: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_path.as_bytes());
    hasher.update(b"::");
    hasher.update(index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Splits plain (non-Markdown) text into paragraphs on blank lines, then
/// applies the same size bounds as the Markdown chunker. Always produces
/// an empty `heading_path`.
pub fn chunk_plain_text(text: &str, path: &str, params: ChunkParams) -> Vec<ChunkRecord> {
    let normalized = normalize_path(path);
    let normalized_text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut paragraphs: Vec<&str> = Vec::new();
    for part in normalized_text.split("\n\n") {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            paragraphs.push(trimmed);
        }
    }

    let mut buffer = String::new();
    let mut emitted: Vec<String> = Vec::new();
    for para in paragraphs {
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(para);
        if buffer.chars().count() >= params.max_chunk_chars {
            emitted.push(std::mem::take(&mut buffer));
        }
    }
    if !buffer.trim().is_empty() {
        emitted.push(buffer);
    }
    if emitted.is_empty() && !normalized_text.trim().is_empty() {
        emitted.push(normalized_text.trim().to_string());
    }

    emitted
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let chunk_id = chunk_id_for(&normalized, index as u32);
            ChunkRecord::new(chunk_id, 0, index as u32, "", content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_section_empty_heading_path() {
        let chunks = chunk_plain_text("alpha\n\nbeta\n", "notes.txt", ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, "");
        assert!(chunks[0].content.contains("alpha"));
        assert!(chunks[0].content.contains("beta"));
    }
}
