//! Paragraph-accumulating chunker
//!
//! Paragraphs (blank-line separated) accumulate into a running buffer while
//! they fit under `max_chunk_chars`; on overflow the buffer flushes as a
//! chunk. A single paragraph that itself exceeds the bound is hard-split
//! into fixed-size slices on char boundaries. The resulting list is
//! truncated to `max_chunks`.

/// Separator re-inserted between accumulated paragraphs
const PARAGRAPH_SEP: &str = "\n\n";

/// Split normalized text into ordered chunk contents
pub fn chunk_text(text: &str, max_chunk_chars: usize, max_chunks: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for paragraph in text.split(PARAGRAPH_SEP).filter(|p| !p.trim().is_empty()) {
        let para_len = paragraph.chars().count();
        let buffer_len = buffer.chars().count();

        let candidate = if buffer.is_empty() {
            para_len
        } else {
            buffer_len + PARAGRAPH_SEP.len() + para_len
        };

        if candidate <= max_chunk_chars {
            if !buffer.is_empty() {
                buffer.push_str(PARAGRAPH_SEP);
            }
            buffer.push_str(paragraph);
            continue;
        }

        if !buffer.is_empty() {
            chunks.push(std::mem::take(&mut buffer));
        }

        if para_len > max_chunk_chars {
            chunks.extend(hard_split(paragraph, max_chunk_chars));
        } else {
            buffer.push_str(paragraph);
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks.truncate(max_chunks);
    chunks
}

/// Split an oversized paragraph into slices of at most `limit` characters
fn hard_split(paragraph: &str, limit: usize) -> Vec<String> {
    let mut slices = Vec::new();
    let mut current = String::with_capacity(limit);
    let mut count = 0;
    for ch in paragraph.chars() {
        current.push(ch);
        count += 1;
        if count == limit {
            slices.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        slices.push(current);
    }
    slices
}
