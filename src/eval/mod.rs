//! Evaluation harness
//!
//! Wraps a query engine to observe every query/response pair without
//! altering retrieval behavior, scores each pair with the feedback judges
//! and records an immutable trace keyed by application label. The trace
//! registry is an explicit, injectable store with atomic append, not hidden
//! process-wide state.

pub mod feedback;
pub mod leaderboard;

pub use feedback::{FeedbackKind, JudgeScorer, ScoringError};
pub use leaderboard::{format_rows, leaderboard, LeaderboardRow};

use crate::store::NodeId;
use crate::synthesis::{QueryEngine, QueryResponse, SynthesisError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// One query's full record: inputs, outputs and scores. Immutable once
/// appended; a missing score means the scorer failed, never that it scored
/// zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub id: Uuid,
    pub app_id: String,
    pub query: String,
    pub response: String,
    /// Retrieved context node ids in ranked order
    pub context_ids: Vec<NodeId>,
    pub scores: HashMap<FeedbackKind, Option<f32>>,
    pub recorded_at: DateTime<Utc>,
}

impl TraceRecord {
    pub fn new(
        app_id: String,
        query: String,
        response: String,
        context_ids: Vec<NodeId>,
        scores: HashMap<FeedbackKind, Option<f32>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id,
            query,
            response,
            context_ids,
            scores,
            recorded_at: Utc::now(),
        }
    }
}

/// Shared trace registry. Cheap to clone; every clone appends to the same
/// underlying list. Concurrent appends never lose records.
#[derive(Debug, Clone, Default)]
pub struct TraceStore {
    inner: Arc<RwLock<Vec<TraceRecord>>>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: TraceRecord) {
        let mut records = self.inner.write().expect("trace store lock poisoned");
        records.push(record);
    }

    /// Snapshot of all records
    pub fn records(&self) -> Vec<TraceRecord> {
        self.inner
            .read()
            .expect("trace store lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("trace store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transparent recorder around a query engine
pub struct EvalRecorder {
    engine: QueryEngine,
    scorer: JudgeScorer,
    traces: TraceStore,
    app_id: String,
}

impl EvalRecorder {
    pub fn new(
        engine: QueryEngine,
        scorer: JudgeScorer,
        traces: TraceStore,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            scorer,
            traces,
            app_id: app_id.into(),
        }
    }

    /// Run one query through the wrapped engine, score it and record the
    /// trace. The engine's response is returned unchanged. A scoring
    /// failure only nulls out that score field.
    pub async fn record_query(&self, question: &str) -> Result<QueryResponse, SynthesisError> {
        let response = self.engine.query(question).await?;

        let context_texts: Vec<String> =
            response.context.iter().map(|c| c.text.clone()).collect();

        let mut scores = HashMap::new();
        for kind in FeedbackKind::ALL {
            match self
                .scorer
                .score(kind, question, &response.answer, &context_texts)
                .await
            {
                Ok(value) => {
                    scores.insert(kind, Some(value));
                }
                Err(err) => {
                    tracing::warn!(%kind, error = %err, "feedback scorer failed, recording missing score");
                    scores.insert(kind, None);
                }
            }
        }

        self.traces.append(TraceRecord::new(
            self.app_id.clone(),
            question.to_string(),
            response.answer.clone(),
            response.context.iter().map(|c| c.id).collect(),
            scores,
        ));

        Ok(response)
    }

    /// Evaluate a list of questions. Queries are independent and run through
    /// a bounded worker pool; the first synthesis failure aborts the batch.
    pub async fn run_batch(&self, questions: &[String]) -> Result<usize, SynthesisError> {
        let concurrency = num_cpus::get().clamp(1, 4);

        let mut stream = stream::iter(questions.iter().map(|q| self.record_query(q)))
            .buffer_unordered(concurrency);

        let mut completed = 0;
        while let Some(result) = stream.next().await {
            result?;
            completed += 1;
        }

        tracing::info!(app = %self.app_id, completed, "evaluation batch finished");
        Ok(completed)
    }

    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionClient, CompletionError};
    use crate::retrieval::{RetrievalError, RetrievalResult, Retriever, ScoredNode};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneNodeRetriever;

    #[async_trait]
    impl Retriever for OneNodeRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<RetrievalResult, RetrievalError> {
            Ok(vec![ScoredNode {
                id: NodeId(0),
                score: 0.9,
            }])
        }

        fn context_text(&self, _id: NodeId) -> Option<String> {
            Some("the only context".to_string())
        }
    }

    /// Completion stub: answers queries, and judges with "8" except for
    /// groundedness prompts, where it fails
    struct FlakyJudgeLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FlakyJudgeLlm {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("EVIDENCE") {
                return Err(CompletionError::ConnectionError("judge down".to_string()));
            }
            if prompt.starts_with("Rate from") {
                return Ok("8".to_string());
            }
            Ok("an answer".to_string())
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn recorder(llm: Arc<dyn CompletionClient>, traces: TraceStore) -> EvalRecorder {
        let engine = QueryEngine::new(Box::new(OneNodeRetriever), llm.clone(), "\n\n", 3);
        EvalRecorder::new(engine, JudgeScorer::new(llm), traces, "test-app")
    }

    #[tokio::test]
    async fn scoring_failure_records_missing_not_zero() {
        let llm = Arc::new(FlakyJudgeLlm {
            calls: AtomicUsize::new(0),
        });
        let traces = TraceStore::new();
        let rec = recorder(llm, traces.clone());

        let response = rec.record_query("does it ground?").await.unwrap();
        assert_eq!(response.answer, "an answer");

        let records = traces.records();
        assert_eq!(records.len(), 1);
        let trace = &records[0];
        assert_eq!(trace.app_id, "test-app");
        assert_eq!(trace.context_ids, vec![NodeId(0)]);
        assert_eq!(
            trace.scores[&FeedbackKind::AnswerRelevance],
            Some(0.8f32)
        );
        assert_eq!(trace.scores[&FeedbackKind::Groundedness], None);
    }

    #[tokio::test]
    async fn batch_records_every_question() {
        let llm = Arc::new(FlakyJudgeLlm {
            calls: AtomicUsize::new(0),
        });
        let traces = TraceStore::new();
        let rec = recorder(llm, traces.clone());

        let questions: Vec<String> = (0..5).map(|i| format!("pregunta {i}")).collect();
        let completed = rec.run_batch(&questions).await.unwrap();

        assert_eq!(completed, 5);
        assert_eq!(traces.len(), 5);
    }

    #[test]
    fn concurrent_appends_keep_all_records() {
        let traces = TraceStore::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = traces.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    store.append(TraceRecord::new(
                        format!("app-{i}"),
                        format!("q{j}"),
                        "r".to_string(),
                        Vec::new(),
                        HashMap::new(),
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(traces.len(), 8 * 50);
    }
}
