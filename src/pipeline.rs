//! End-to-end RAG pipeline
//!
//! Facade tying the pieces together: build an index per strategy over a
//! document, query it, and evaluate question sets into the shared trace
//! store. Indexes and the embedding engine are shared read-only across
//! queries.

use crate::config::EngineConfig;
use crate::embedding::EmbeddingEngine;
use crate::eval::{
    format_rows, leaderboard, EvalRecorder, JudgeScorer, LeaderboardRow, TraceStore,
};
use crate::index::SearchIndex;
use crate::llm::{create_client, CompletionClient};
use crate::retrieval::{build_retriever, Strategy};
use crate::synthesis::{QueryEngine, QueryResponse};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct RagPipeline {
    config: EngineConfig,
    embedder: Arc<EmbeddingEngine>,
    llm: Arc<dyn CompletionClient>,
    judge: Arc<dyn CompletionClient>,
    indexes: HashMap<Strategy, Arc<SearchIndex>>,
    traces: TraceStore,
}

impl RagPipeline {
    /// Validate config and bring up the embedding engine and model clients
    pub async fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let embedder = Arc::new(
            EmbeddingEngine::new()
                .await
                .context("embedding engine init")?,
        );
        let llm: Arc<dyn CompletionClient> = Arc::from(create_client(&config.model)?);
        let judge: Arc<dyn CompletionClient> = Arc::from(create_client(config.judge_model())?);

        Ok(Self {
            config,
            embedder,
            llm,
            judge,
            indexes: HashMap::new(),
            traces: TraceStore::new(),
        })
    }

    /// Build (or rebuild) the index for one strategy over a document
    pub async fn build(&mut self, text: &str, strategy: Strategy) -> Result<()> {
        let index = match strategy {
            Strategy::AutoMerging => {
                SearchIndex::build_hierarchical(text, &self.config.chunking, &self.embedder).await?
            }
            Strategy::SentenceWindow => {
                SearchIndex::build_sentence(text, &self.config.window, &self.embedder).await?
            }
            Strategy::Baseline => {
                // baseline indexes the finest hierarchy tier as flat chunks
                let chunk_size = *self
                    .config
                    .chunking
                    .tiers
                    .last()
                    .context("no chunk tiers configured")?;
                SearchIndex::build_flat(text, chunk_size, self.config.chunking.overlap, &self.embedder)
                    .await?
            }
        };

        tracing::info!(%strategy, nodes = index.store.len(), "index ready");
        self.indexes.insert(strategy, Arc::new(index));
        Ok(())
    }

    /// Persist a built index
    pub fn save(&self, strategy: Strategy, path: &Path) -> Result<()> {
        let index = self
            .indexes
            .get(&strategy)
            .with_context(|| format!("no index built for strategy {strategy}"))?;
        index.save_to(path.to_path_buf())
    }

    /// Load a previously saved index for a strategy
    pub fn load(&mut self, strategy: Strategy, path: &Path) -> Result<()> {
        let index = SearchIndex::load_from(path.to_path_buf())?;
        self.indexes.insert(strategy, Arc::new(index));
        Ok(())
    }

    fn engine(&self, strategy: Strategy, k: usize) -> Result<QueryEngine> {
        let index = self
            .indexes
            .get(&strategy)
            .with_context(|| format!("no index built for strategy {strategy}"))?
            .clone();

        let retriever = build_retriever(
            strategy,
            index,
            self.embedder.clone(),
            &self.config.retrieval,
        );

        Ok(QueryEngine::new(
            retriever,
            self.llm.clone(),
            self.config.retrieval.separator.clone(),
            k,
        ))
    }

    /// Answer one query with the chosen strategy
    pub async fn query(
        &self,
        question: &str,
        strategy: Strategy,
        k: usize,
    ) -> Result<QueryResponse> {
        let engine = self.engine(strategy, k)?;
        let response = engine.query(question).await?;
        Ok(response)
    }

    /// Evaluate a question list under an application label; returns how many
    /// queries completed
    pub async fn evaluate(
        &self,
        strategy: Strategy,
        questions: &[String],
        app_id: Option<&str>,
    ) -> Result<usize> {
        let engine = self.engine(strategy, self.config.retrieval.top_k)?;
        let recorder = EvalRecorder::new(
            engine,
            JudgeScorer::new(self.judge.clone()),
            self.traces.clone(),
            app_id.unwrap_or_else(|| strategy.app_label()),
        );

        let completed = recorder.run_batch(questions).await?;
        Ok(completed)
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        leaderboard(&self.traces)
    }

    pub fn leaderboard_table(&self) -> String {
        format_rows(&self.leaderboard())
    }

    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }
}
