//! Embedding/similarity index
//!
//! `VectorIndex` maps node ids to embedding vectors and answers top-k cosine
//! queries. `SearchIndex` bundles a node store with its vectors and owns the
//! build and save/load paths. The similarity metric is cosine on both the
//! build and the query side.

use crate::chunking;
use crate::config::{ChunkingConfig, WindowConfig};
use crate::embedding::{EmbeddingEngine, EmbeddingError};
use crate::store::{IntegrityError, NodeId, NodeStore};
use anyhow::Result;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

/// Embedding batch size during index build
const BATCH_SIZE: usize = 128;

/// Index construction failures
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("embedding failure: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index integrity violated: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Node-id keyed vector store with incremental indexing. Vectors are
/// append-only: a node with unchanged text is never re-embedded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    vectors: HashMap<NodeId, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.vectors.contains_key(&id)
    }

    /// Insert a precomputed vector (used by loaders and tests)
    pub fn insert_vector(&mut self, id: NodeId, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    /// Embed and store the given nodes in batches, skipping ids that already
    /// have a vector. Returns how many nodes were newly embedded. An
    /// embedding failure aborts the whole call.
    pub async fn index_nodes(
        &mut self,
        embedder: &EmbeddingEngine,
        store: &NodeStore,
        ids: &[NodeId],
    ) -> Result<usize, EmbeddingError> {
        let pending: Vec<(NodeId, &str)> = ids
            .iter()
            .copied()
            .filter(|id| !self.vectors.contains_key(id))
            .filter_map(|id| store.get(id).map(|n| (id, n.text.as_str())))
            .collect();

        let mut indexed = 0;
        for batch in pending.chunks(BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|&(_, text)| text).collect();
            let embeddings = embedder.embed_batch(texts).await?;
            for (&(id, _), embedding) in batch.iter().zip(embeddings.into_iter()) {
                self.vectors.insert(id, embedding);
                indexed += 1;
            }
        }

        Ok(indexed)
    }

    /// Embed the query once and return the top-k nodes by cosine similarity
    pub async fn query(
        &self,
        embedder: &EmbeddingEngine,
        text: &str,
        k: usize,
    ) -> Result<Vec<(NodeId, f32)>, EmbeddingError> {
        let q_emb = embedder.embed_text(text).await?;
        Ok(self.query_with_embedding(&q_emb, k))
    }

    /// Top-k over a precomputed query embedding. Descending score; equal
    /// scores break ties towards the lower node id.
    pub fn query_with_embedding(&self, q_emb: &[f32], k: usize) -> Vec<(NodeId, f32)> {
        // Bounded min-heap: the worst kept entry is the lowest score, and
        // among equal scores the highest id, so ties resolve to lower ids.
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<NodeId>)>> =
            BinaryHeap::with_capacity(k + 1);

        for (&id, vector) in &self.vectors {
            let sim = EmbeddingEngine::cosine_similarity(q_emb, vector);
            heap.push(Reverse((OrderedFloat(sim), Reverse(id))));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut hits: Vec<(NodeId, f32)> = heap
            .into_iter()
            .map(|Reverse((score, Reverse(id)))| (id, score.into_inner()))
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        hits
    }
}

/// A built index over one document: node store plus vectors. Built once per
/// document version, read-only during querying.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchIndex {
    pub store: NodeStore,
    pub vectors: VectorIndex,
}

impl SearchIndex {
    /// Build the multi-level hierarchy and embed its leaves. Parents are
    /// reachable only through merging, never by direct similarity.
    pub async fn build_hierarchical(
        text: &str,
        config: &ChunkingConfig,
        embedder: &EmbeddingEngine,
    ) -> Result<Self, IndexError> {
        let mut store = NodeStore::new();
        chunking::build_hierarchy(&mut store, text, config);
        store.validate()?;

        let mut vectors = VectorIndex::new();
        let leaves = store.leaf_ids();
        let indexed = vectors.index_nodes(embedder, &store, &leaves).await?;
        tracing::info!(leaves = indexed, "hierarchical index built");

        Ok(Self { store, vectors })
    }

    /// Build the flat sentence index. Only the single sentence text is
    /// embedded; windows ride along as metadata.
    pub async fn build_sentence(
        text: &str,
        config: &WindowConfig,
        embedder: &EmbeddingEngine,
    ) -> Result<Self, IndexError> {
        let mut store = NodeStore::new();
        let ids = chunking::build_sentence_index(&mut store, text, config.window_size);
        store.validate()?;

        let mut vectors = VectorIndex::new();
        let indexed = vectors.index_nodes(embedder, &store, &ids).await?;
        tracing::info!(sentences = indexed, "sentence-window index built");

        Ok(Self { store, vectors })
    }

    /// Build a flat single-tier chunk index (the plain baseline)
    pub async fn build_flat(
        text: &str,
        chunk_size: usize,
        overlap: usize,
        embedder: &EmbeddingEngine,
    ) -> Result<Self, IndexError> {
        let mut store = NodeStore::new();
        let ids: Vec<NodeId> = chunking::chunk_text(text, chunk_size, overlap)
            .into_iter()
            .map(|chunk| store.insert(chunk, 0, None))
            .collect();

        let mut vectors = VectorIndex::new();
        let indexed = vectors.index_nodes(embedder, &store, &ids).await?;
        tracing::info!(chunks = indexed, "flat index built");

        Ok(Self { store, vectors })
    }

    /// Snapshot to disk. The byte layout is opaque; the only contract is
    /// that loading reproduces identical retrieval behavior.
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        let data = bincode::serialize(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let data = std::fs::read(path)?;
        let index: Self = bincode::deserialize(&data)?;
        index.store.validate()?;
        Ok(index)
    }

    /// Default on-disk location for a named index
    pub fn cache_path(tag: &str) -> PathBuf {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("faro");
        std::fs::create_dir_all(&cache_dir).ok();
        cache_dir.join(format!("{tag}.idx"))
    }
}
