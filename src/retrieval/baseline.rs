//! Plain top-k retrieval over whatever the index embedded

use crate::embedding::EmbeddingEngine;
use crate::index::SearchIndex;
use crate::retrieval::{RetrievalError, RetrievalResult, Retriever, ScoredNode};
use crate::store::NodeId;
use async_trait::async_trait;
use std::sync::Arc;

pub struct BaselineRetriever {
    index: Arc<SearchIndex>,
    embedder: Arc<EmbeddingEngine>,
}

impl BaselineRetriever {
    pub fn new(index: Arc<SearchIndex>, embedder: Arc<EmbeddingEngine>) -> Self {
        Self { index, embedder }
    }

    /// Top-k with a precomputed query embedding
    pub fn retrieve_with_embedding(&self, q_emb: &[f32], k: usize) -> RetrievalResult {
        self.index
            .vectors
            .query_with_embedding(q_emb, k)
            .into_iter()
            .map(|(id, score)| ScoredNode { id, score })
            .collect()
    }
}

#[async_trait]
impl Retriever for BaselineRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let q_emb = self.embedder.embed_text(query).await?;
        Ok(self.retrieve_with_embedding(&q_emb, k))
    }

    fn context_text(&self, id: NodeId) -> Option<String> {
        self.index.store.get(id).map(|n| n.text.clone())
    }
}
