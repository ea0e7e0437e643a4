//! Sentence-window indexer
//!
//! Splits text into a flat ordered sequence of sentence nodes. For each node
//! at position `i` the window `[i-k, i+k]` (clipped to document bounds) is
//! precomputed and stored as metadata. Only the single sentence is embedded;
//! matching stays precise while synthesis sees the wider span.

use crate::store::{NodeId, NodeStore, WindowMeta};

/// Split text into sentences. A sentence ends at `.`, `!` or `?` (plus any
/// trailing terminators or closing quotes) followed by whitespace or end of
/// input. Trailing text without a terminator counts as a final sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let mut end = i + c.len_utf8();
            while let Some(&(j, n)) = chars.peek() {
                if matches!(n, '.' | '!' | '?' | '"' | '\'' | ')') {
                    end = j + n.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let at_boundary = chars.peek().map_or(true, |&(_, n)| n.is_whitespace());
            if at_boundary {
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Build the flat sentence index and return the node ids in document order.
/// Window text is a single contiguous join over the clipped span.
pub fn build_sentence_index(
    store: &mut NodeStore,
    text: &str,
    window_size: usize,
) -> Vec<NodeId> {
    let sentences = split_sentences(text);

    let ids: Vec<NodeId> = sentences
        .iter()
        .map(|s| store.insert(s.clone(), 0, None))
        .collect();

    for (i, &id) in ids.iter().enumerate() {
        let lo = i.saturating_sub(window_size);
        let hi = usize::min(sentences.len() - 1, i + window_size);
        let window_text = sentences[lo..=hi].join(" ");

        store.set_window(
            id,
            WindowMeta {
                text: window_text,
                start_id: ids[lo],
                end_id: ids[hi],
            },
        );
    }

    tracing::debug!(sentences = ids.len(), window_size, "built sentence index");

    ids
}
