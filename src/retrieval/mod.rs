//! Retrieval strategies
//!
//! Every strategy answers the same contract: `retrieve(query, k)` returns a
//! ranked list of (node, score) pairs, descending by score, ties broken by
//! the lower node id. Strategy selection is a configuration-driven enum, not
//! runtime type inspection.

pub mod auto_merge;
pub mod baseline;
pub mod rerank;
pub mod window;

pub use auto_merge::AutoMergingRetriever;
pub use baseline::BaselineRetriever;
pub use rerank::Reranker;
pub use window::SentenceWindowRetriever;

use crate::config::{ConfigError, RetrievalConfig};
use crate::embedding::{EmbeddingEngine, EmbeddingError};
use crate::index::SearchIndex;
use crate::store::{IntegrityError, NodeId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// One retrieved node with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub id: NodeId,
    pub score: f32,
}

/// Ranked retrieval output: descending score, stable on ties by id
pub type RetrievalResult = Vec<ScoredNode>;

/// Failures during retrieval. Similarity-index failures abort the whole
/// retrieval; nothing degrades silently.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("embedding failure: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index integrity violated: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Uniform retrieval contract
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve the top-k nodes for a query
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError>;

    /// The text synthesis should see for a retrieved node. Sentence-window
    /// retrieval substitutes the precomputed window here.
    fn context_text(&self, id: NodeId) -> Option<String>;
}

/// Retrieval strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Plain top-k over flat chunks
    Baseline,
    /// Sentence embeddings with window substitution
    SentenceWindow,
    /// Hierarchical leaves with sibling merging
    AutoMerging,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Baseline,
        Strategy::SentenceWindow,
        Strategy::AutoMerging,
    ];

    /// Default application label for the leaderboard
    pub fn app_label(&self) -> &'static str {
        match self {
            Strategy::Baseline => "Direct Query Engine",
            Strategy::SentenceWindow => "Sentence Window Query Engine",
            Strategy::AutoMerging => "Automerging Query Engine",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Baseline => write!(f, "baseline"),
            Strategy::SentenceWindow => write!(f, "sentence-window"),
            Strategy::AutoMerging => write!(f, "auto-merging"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" => Ok(Strategy::Baseline),
            "sentence-window" | "sentence_window" => Ok(Strategy::SentenceWindow),
            "auto-merging" | "auto_merging" | "automerging" => Ok(Strategy::AutoMerging),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown strategy: {}",
                s
            ))),
        }
    }
}

/// Build the retriever for a strategy over a prepared index
pub fn build_retriever(
    strategy: Strategy,
    index: Arc<SearchIndex>,
    embedder: Arc<EmbeddingEngine>,
    config: &RetrievalConfig,
) -> Box<dyn Retriever> {
    match strategy {
        Strategy::Baseline => Box::new(BaselineRetriever::new(index, embedder)),
        Strategy::SentenceWindow => {
            let reranker = config.rerank.then(Reranker::new);
            Box::new(SentenceWindowRetriever::new(index, embedder, reranker))
        }
        Strategy::AutoMerging => Box::new(AutoMergingRetriever::new(
            index,
            embedder,
            config.merge_threshold,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_str() {
        for strategy in Strategy::ALL {
            let parsed: Strategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!("mystery".parse::<Strategy>().is_err());
    }
}
