use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

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

fn heading_path(stack: &[(u8, String)]) -> String {
    stack
        .iter()
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Parses Markdown into an ordered chunk sequence. Pure and deterministic:
/// identical bytes and params always yield the same chunk_ids and content.
pub fn chunk_markdown(text: &str, path: &str, params: ChunkParams) -> Vec<ChunkRecord> {
    let normalized = normalize_path(path);
    let parser = Parser::new_ext(text, Options::empty());

    let mut heading_stack: Vec<(u8, String)> = Vec::new();
    let mut heading_collect: Option<(u8, String)> = None;
    let mut block_start: Option<usize> = None;
    let mut buffer = String::new();
    let mut depth: i32 = 0;

    let mut emitted: Vec<(String, String)> = Vec::new(); // (heading_path, content)

    let mut flush_buffer = |buffer: &mut String, heading_stack: &[(u8, String)], emitted: &mut Vec<(String, String)>| {
        let trimmed = buffer.trim();
        if !trimmed.is_empty() {
            emitted.push((heading_path(heading_stack), trimmed.to_string()));
        }
        buffer.clear();
    };

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    match &tag {
                        Tag::Heading { level, .. } => {
                            if buffer.trim().chars().count() >= params.min_chunk_chars {
                                flush_buffer(&mut buffer, &heading_stack, &mut emitted);
                            }
                            heading_collect = Some((heading_level_to_u8(*level), String::new()));
                        }
                        _ => {
                            block_start = Some(range.start);
                        }
                    }
                }
                depth += 1;
            }
            Event::End(tag_end) => {
                depth -= 1;
                if depth == 0 {
                    match tag_end {
                        TagEnd::Heading(_) => {
                            if let Some((level, collected)) = heading_collect.take() {
                                heading_stack.retain(|(l, _)| *l < level);
                                heading_stack.push((level, collected.trim().to_string()));
                            }
                        }
                        TagEnd::CodeBlock => {
                            if let Some(start) = block_start.take() {
                                if !buffer.trim().is_empty() {
                                    flush_buffer(&mut buffer, &heading_stack, &mut emitted);
                                }
                                let raw = text[start..range.end].trim();
                                if !raw.is_empty() {
                                    emitted.push((heading_path(&heading_stack), raw.to_string()));
                                }
                            }
                        }
                        _ => {
                            if let Some(start) = block_start.take() {
                                buffer.push_str(&text[start..range.end]);
                                buffer.push('\n');
                                if buffer.trim().chars().count() >= params.max_chunk_chars {
                                    flush_buffer(&mut buffer, &heading_stack, &mut emitted);
                                }
                            }
                        }
                    }
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, collected)) = heading_collect.as_mut() {
                    collected.push_str(&t);
                }
            }
            _ => {}
        }
    }
    flush_buffer(&mut buffer, &heading_stack, &mut emitted);

    emitted
        .into_iter()
        .enumerate()
        .map(|(index, (heading, content))| {
            let chunk_id = chunk_id_for(&normalized, index as u32);
            ChunkRecord::new(chunk_id, 0, index as u32, heading, content)
        })
        .collect()
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_deterministic_chunk_id_and_headings() {
        let md = "# A\n\nalpha\n\n# B\n\nbeta\n";
        let params = ChunkParams { min_chunk_chars: 1, max_chunk_chars: 1000 };
        let chunks = chunk_markdown(md, "notes.md", params);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, "A");
        assert_eq!(chunks[0].content, "alpha");
        assert_eq!(chunks[1].heading_path, "B");
        assert_eq!(chunks[1].content, "beta");

        let expect0 = chunk_id_for("notes.md", 0);
        let expect1 = chunk_id_for("notes.md", 1);
        assert_eq!(chunks[0].chunk_id, expect0);
        assert_eq!(chunks[1].chunk_id, expect1);
    }

    #[test]
    fn s2_code_block_not_split() {
        let body = "x".repeat(2000);
        let md = format!("intro text\n\n```\n{body}\n```\n\nmore prose here that follows the code\n");
        let params = ChunkParams { min_chunk_chars: 1, max_chunk_chars: 1200 };
        let chunks = chunk_markdown(&md, "big.md", params);
        let code_chunk = chunks.iter().find(|c| c.content.contains(&body)).expect("code chunk present");
        assert!(code_chunk.content.len() >= 2000);
        assert!(code_chunk.content.starts_with("```"));
    }

    #[test]
    fn determinism_across_runs() {
        let md = "# Title\n\nsome body text here.\n";
        let params = ChunkParams::default();
        let a = chunk_markdown(md, "./doc.md", params);
        let b = chunk_markdown(md, "doc.md", params);
        assert_eq!(a, b);
    }

    #[test]
    fn non_markdown_heading_absent_content_unaffected() {
        let md = "plain paragraph with no headings at all.\n";
        let chunks = chunk_markdown(md, "plain.md", ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, "");
    }
}
