//! Document chunking
//!
//! Two indexing shapes over the same node store: a multi-level hierarchy for
//! auto-merging retrieval, and a flat sentence sequence with precomputed
//! windows for sentence-window retrieval.

pub mod hierarchy;
pub mod sentence;
pub mod text;

pub use hierarchy::build_hierarchy;
pub use sentence::{build_sentence_index, split_sentences};
pub use text::chunk_text;
