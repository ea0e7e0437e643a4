//! Query orchestration and response synthesis
//!
//! Runs the configured retriever, concatenates the ranked context texts and
//! sends a single completion request. No retries: a completion failure
//! surfaces to the caller. With the default low (but non-zero) temperature
//! the answer is stable across calls but not guaranteed identical; that
//! nondeterminism lives in the service, not here.

use crate::llm::{CompletionClient, CompletionError};
use crate::retrieval::{RetrievalError, Retriever};
use crate::store::NodeId;
use std::sync::Arc;
use thiserror::Error;

/// Synthesis failures abort the current query
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}

/// One retrieved context entry as synthesis saw it
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub id: NodeId,
    pub score: f32,
    pub text: String,
}

/// Answer plus the ranked context it was grounded on
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub answer: String,
    pub context: Vec<RetrievedContext>,
}

/// Retriever + completion service behind one query call
pub struct QueryEngine {
    retriever: Box<dyn Retriever>,
    llm: Arc<dyn CompletionClient>,
    separator: String,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(
        retriever: Box<dyn Retriever>,
        llm: Arc<dyn CompletionClient>,
        separator: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            separator: separator.into(),
            top_k,
        }
    }

    /// Answer a query grounded on retrieved context
    pub async fn query(&self, question: &str) -> Result<QueryResponse, SynthesisError> {
        let hits = self.retriever.retrieve(question, self.top_k).await?;

        let mut context = Vec::with_capacity(hits.len());
        for hit in &hits {
            if let Some(text) = self.retriever.context_text(hit.id) {
                context.push(RetrievedContext {
                    id: hit.id,
                    score: hit.score,
                    text,
                });
            }
        }

        let block = context
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator);
        let prompt = qa_prompt(question, &block);

        tracing::debug!(
            nodes = context.len(),
            chars = block.len(),
            "synthesizing answer"
        );
        let answer = self.llm.complete(&prompt).await?;

        Ok(QueryResponse { answer, context })
    }
}

/// Context-then-question QA prompt
fn qa_prompt(question: &str, context: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, \
         answer the query.\n\
         Query: {question}\n\
         Answer:"
    )
}
