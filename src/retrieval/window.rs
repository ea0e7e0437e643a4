//! Sentence-window retrieval
//!
//! Matches against single-sentence embeddings, then hands synthesis the
//! precomputed surrounding window instead of the bare sentence. Windows of
//! adjacent retrieved sentences overlap and are NOT deduplicated; the
//! duplication is an accepted cost of keeping substitution trivial.

use crate::embedding::EmbeddingEngine;
use crate::index::SearchIndex;
use crate::retrieval::rerank::Reranker;
use crate::retrieval::{RetrievalError, RetrievalResult, Retriever, ScoredNode};
use crate::store::NodeId;
use async_trait::async_trait;
use std::sync::Arc;

pub struct SentenceWindowRetriever {
    index: Arc<SearchIndex>,
    embedder: Arc<EmbeddingEngine>,
    reranker: Option<Reranker>,
}

impl SentenceWindowRetriever {
    pub fn new(
        index: Arc<SearchIndex>,
        embedder: Arc<EmbeddingEngine>,
        reranker: Option<Reranker>,
    ) -> Self {
        Self {
            index,
            embedder,
            reranker,
        }
    }

    /// Retrieve with a precomputed query embedding. The optional rerank
    /// stage runs over the retrieved set before the final truncation to k.
    pub fn retrieve_with_embedding(&self, q_emb: &[f32], k: usize, query: &str) -> RetrievalResult {
        let mut hits: RetrievalResult = self
            .index
            .vectors
            .query_with_embedding(q_emb, k)
            .into_iter()
            .map(|(id, score)| ScoredNode { id, score })
            .collect();

        if let Some(reranker) = &self.reranker {
            hits = reranker.rerank(&self.index.store, hits, query);
        }
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl Retriever for SentenceWindowRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let q_emb = self.embedder.embed_text(query).await?;
        Ok(self.retrieve_with_embedding(&q_emb, k, query))
    }

    /// Window substitution happens here, never at scoring time
    fn context_text(&self, id: NodeId) -> Option<String> {
        self.index
            .store
            .get(id)
            .map(|node| node.context_text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::build_sentence_index;
    use crate::index::VectorIndex;
    use crate::store::NodeStore;

    fn unit(dim: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[at] = 1.0;
        v
    }

    /// Sentence index over five sentences with hand-placed vectors
    fn windowed_index() -> (Arc<SearchIndex>, Vec<NodeId>) {
        let mut store = NodeStore::new();
        let text = "Zero is first. One follows. Two sits mid. Three is near. Four closes.";
        let ids = build_sentence_index(&mut store, text, 1);

        let mut vectors = VectorIndex::new();
        for (i, &id) in ids.iter().enumerate() {
            vectors.insert_vector(id, unit(8, i));
        }

        (Arc::new(SearchIndex { store, vectors }), ids)
    }

    #[test]
    fn substitutes_window_for_sentence() {
        let (index, ids) = windowed_index();

        let hits = index.vectors.query_with_embedding(&unit(8, 2), 1);
        assert_eq!(hits[0].0, ids[2]);

        // context text is the window, not the matched sentence
        let node = index.store.get(ids[2]).unwrap();
        assert_eq!(node.text, "Two sits mid.");
        assert_eq!(
            node.context_text(),
            "One follows. Two sits mid. Three is near."
        );
    }

    #[test]
    fn overlapping_windows_are_not_deduplicated() {
        let (index, ids) = windowed_index();

        // adjacent sentences 1 and 2 both retrieved; their windows share
        // sentences and both stay in the result set
        let w1 = index.store.get(ids[1]).unwrap().window.clone().unwrap();
        let w2 = index.store.get(ids[2]).unwrap().window.clone().unwrap();
        assert!(w1.text.contains("Two sits mid."));
        assert!(w2.text.contains("Two sits mid."));

        let mut q = vec![0.0; 8];
        q[1] = 0.9;
        q[2] = 0.8;
        let hits = index.vectors.query_with_embedding(&q, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, ids[1]);
        assert_eq!(hits[1].0, ids[2]);
    }
}
