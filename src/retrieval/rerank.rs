//! Secondary re-ranking over a retrieved set
//!
//! Blends the similarity score with a query-term overlap boost. Applied to
//! sentence-window retrieval before final truncation; scores stay capped at
//! 1.0.

use crate::retrieval::{RetrievalResult, ScoredNode};
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Boost for each matched query term, scaled by match fraction
    pub keyword_boost: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { keyword_boost: 0.1 }
    }
}

/// Keyword-boost re-ranker
pub struct Reranker {
    config: RerankConfig,
}

impl Reranker {
    pub fn new() -> Self {
        Self {
            config: RerankConfig::default(),
        }
    }

    pub fn with_config(config: RerankConfig) -> Self {
        Self { config }
    }

    /// Re-score and re-order the retrieved set. The returned scores are the
    /// effective ranking scores.
    pub fn rerank(&self, store: &NodeStore, hits: RetrievalResult, query: &str) -> RetrievalResult {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(str::to_string)
            .collect();

        let mut ranked: Vec<ScoredNode> = hits
            .into_iter()
            .map(|hit| {
                let boost = store
                    .get(hit.id)
                    .map(|node| self.keyword_boost(&node.text, &terms))
                    .unwrap_or(0.0);
                ScoredNode {
                    id: hit.id,
                    score: (hit.score + boost).min(1.0),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        ranked
    }

    /// Fraction of query terms present in the text, scaled by the boost
    fn keyword_boost(&self, text: &str, terms: &[String]) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let text = text.to_lowercase();
        let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
        self.config.keyword_boost * matched as f32 / terms.len() as f32
    }
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new()
    }
}
