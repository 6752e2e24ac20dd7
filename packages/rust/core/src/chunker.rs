//! Overlapping, size-bounded document splitting.
//!
//! Sizes are measured in characters. Each window ends at the last paragraph
//! break inside it, else the last line break, else the last space, else a hard
//! cut. The next window starts `chunk_overlap` characters before the previous
//! end, nudged forward to a word boundary.

use newsrag_shared::{Chunk, ChunkConfig, Document};

/// Separators tried in order when choosing where a window ends.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Split every document and copy its metadata onto each chunk.
pub fn chunk_documents(docs: &[Document], config: ChunkConfig) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| {
            split_text(&doc.text, config)
                .into_iter()
                .enumerate()
                .map(|(ordinal, text)| Chunk {
                    text,
                    metadata: doc.metadata.clone(),
                    ordinal,
                })
        })
        .collect()
}

/// Split `text` into windows of at most `chunk_size` characters.
pub fn split_text(text: &str, config: ChunkConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size.saturating_sub(1));

    // Byte offset of every char, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        if char_count - start <= size {
            push_trimmed(&mut chunks, &text[bounds[start]..]);
            break;
        }

        let end = window_end(text, &bounds, start, start + size);
        push_trimmed(&mut chunks, &text[bounds[start]..bounds[end]]);

        let mut next = end.saturating_sub(overlap).max(start + 1);
        if next < end && !at_word_start(text, &bounds, next) {
            next = word_start(text, &bounds, next, end);
        }
        start = next;
    }

    chunks
}

/// Char index where the window `[start, hard_end)` should end.
fn window_end(text: &str, bounds: &[usize], start: usize, hard_end: usize) -> usize {
    let window = &text[bounds[start]..bounds[hard_end]];
    // Breaks in the first half of the window would make tiny chunks.
    let min_len = window.len() / 2;

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep).filter(|&pos| pos > min_len) {
            let byte = bounds[start] + pos + sep.len();
            return char_index(bounds, byte);
        }
    }
    hard_end
}

fn at_word_start(text: &str, bounds: &[usize], idx: usize) -> bool {
    idx == 0
        || text[bounds[idx - 1]..bounds[idx]]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
}

/// First char after whitespace in `[from, limit)`, or `from` if none.
fn word_start(text: &str, bounds: &[usize], from: usize, limit: usize) -> usize {
    text[bounds[from]..bounds[limit]]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(pos, c)| char_index(bounds, bounds[from] + pos + c.len_utf8()))
        .filter(|&idx| idx < limit)
        .unwrap_or(from)
}

fn char_index(bounds: &[usize], byte: usize) -> usize {
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        chunks.push(piece.to_string());
    }
}
