//! Reference-free feedback scoring
//!
//! Three independent judge functions, each returning a value in [0, 1]:
//! answer relevance (response vs. query), context relevance (each retrieved
//! text vs. query, aggregated by mean) and groundedness (response vs.
//! concatenated context). The judge is itself a language model, so scores
//! are not reproducible across runs; callers must not assume they are.

use crate::llm::{CompletionClient, CompletionError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Feedback metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    AnswerRelevance,
    ContextRelevance,
    Groundedness,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 3] = [
        FeedbackKind::AnswerRelevance,
        FeedbackKind::ContextRelevance,
        FeedbackKind::Groundedness,
    ];
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnswerRelevance => write!(f, "answer_relevance"),
            Self::ContextRelevance => write!(f, "context_relevance"),
            Self::Groundedness => write!(f, "groundedness"),
        }
    }
}

/// Judge failures. Non-fatal for the evaluation run: the affected score is
/// recorded as missing, never defaulted to zero.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("judge call failed: {0}")]
    Judge(#[from] CompletionError),

    #[error("could not parse a score from judge output: {0:?}")]
    Parse(String),

    #[error("nothing to score")]
    EmptyInput,
}

/// LLM-as-judge scorer
pub struct JudgeScorer {
    llm: Arc<dyn CompletionClient>,
    score_re: Regex,
}

impl JudgeScorer {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self {
            llm,
            score_re: Regex::new(r"\d+(?:\.\d+)?").expect("score pattern is valid"),
        }
    }

    /// Score one feedback kind for a completed query
    pub async fn score(
        &self,
        kind: FeedbackKind,
        query: &str,
        response: &str,
        context: &[String],
    ) -> Result<f32, ScoringError> {
        match kind {
            FeedbackKind::AnswerRelevance => {
                let prompt = format!(
                    "Rate from 0 to 10 how relevant the RESPONSE is to the QUESTION.\n\
                     QUESTION: {query}\n\
                     RESPONSE: {response}\n\
                     Reply with only the number."
                );
                self.rate(&prompt).await
            }
            FeedbackKind::ContextRelevance => {
                if context.is_empty() {
                    return Err(ScoringError::EmptyInput);
                }
                // mean over per-passage ratings
                let mut sum = 0.0;
                for passage in context {
                    let prompt = format!(
                        "Rate from 0 to 10 how relevant the PASSAGE is to the QUESTION.\n\
                         QUESTION: {query}\n\
                         PASSAGE: {passage}\n\
                         Reply with only the number."
                    );
                    sum += self.rate(&prompt).await?;
                }
                Ok(sum / context.len() as f32)
            }
            FeedbackKind::Groundedness => {
                let joined = context.join("\n");
                let prompt = format!(
                    "Rate from 0 to 10 how well every claim in the RESPONSE is \
                     supported by the EVIDENCE.\n\
                     EVIDENCE: {joined}\n\
                     RESPONSE: {response}\n\
                     Reply with only the number."
                );
                self.rate(&prompt).await
            }
        }
    }

    /// Ask the judge for a 0-10 rating and scale it to [0, 1]
    async fn rate(&self, prompt: &str) -> Result<f32, ScoringError> {
        let output = self.llm.complete(prompt).await?;
        let raw = self
            .score_re
            .find(&output)
            .ok_or_else(|| ScoringError::Parse(output.clone()))?
            .as_str()
            .parse::<f32>()
            .map_err(|_| ScoringError::Parse(output.clone()))?;

        Ok((raw.clamp(0.0, 10.0)) / 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedJudge {
        reply: String,
    }

    #[async_trait]
    impl CompletionClient for CannedJudge {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn scorer(reply: &str) -> JudgeScorer {
        JudgeScorer::new(Arc::new(CannedJudge {
            reply: reply.to_string(),
        }))
    }

    #[tokio::test]
    async fn parses_bare_number() {
        let score = scorer("8")
            .score(FeedbackKind::AnswerRelevance, "q", "r", &[])
            .await
            .unwrap();
        assert!((score - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn parses_number_with_chatter() {
        let score = scorer("I would rate this 7.5 out of 10.")
            .score(FeedbackKind::Groundedness, "q", "r", &["ev".to_string()])
            .await
            .unwrap();
        assert!((score - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn clamps_out_of_range_ratings() {
        let score = scorer("42")
            .score(FeedbackKind::AnswerRelevance, "q", "r", &[])
            .await
            .unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn context_relevance_averages_passages() {
        // same canned reply per passage, mean equals the single rating
        let context = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let score = scorer("6")
            .score(FeedbackKind::ContextRelevance, "q", "r", &context)
            .await
            .unwrap();
        assert!((score - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unparseable_output_is_an_error() {
        let result = scorer("no idea")
            .score(FeedbackKind::AnswerRelevance, "q", "r", &[])
            .await;
        assert!(matches!(result, Err(ScoringError::Parse(_))));
    }

    #[tokio::test]
    async fn context_relevance_needs_context() {
        let result = scorer("5")
            .score(FeedbackKind::ContextRelevance, "q", "r", &[])
            .await;
        assert!(matches!(result, Err(ScoringError::EmptyInput)));
    }
}
