//! Embedding Module
//!
//! Provides text embedding generation using FastEmbed (ONNX-based, local
//! inference). Embeddings must be deterministic for identical text within a
//! session; an LRU cache guarantees a text is never embedded twice.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Default embedding model
const DEFAULT_MODEL: EmbeddingModel = EmbeddingModel::AllMiniLML6V2;

/// Embedding dimension for AllMiniLML6V2
pub const EMBEDDING_DIMENSION: usize = 384;

/// Embedding-service failures. These abort the indexing or query operation
/// that triggered them; there is no partial silent degradation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("failed to initialize embedding model: {0}")]
    Init(String),

    #[error("embedding inference failed: {0}")]
    Inference(String),

    #[error("embedding task cancelled: {0}")]
    Cancelled(String),

    #[error("embedding service produced no vector")]
    Empty,
}

/// Embedding engine for generating text embeddings
pub struct EmbeddingEngine {
    model: Arc<RwLock<TextEmbedding>>,
    cache: Arc<RwLock<LruCache<String, Vec<f32>>>>,
    model_name: String,
    dimension: usize,
}

impl EmbeddingEngine {
    /// Create a new embedding engine with the default model
    pub async fn new() -> Result<Self, EmbeddingError> {
        Self::with_model(DEFAULT_MODEL).await
    }

    /// Create a new embedding engine with a specific model
    pub async fn with_model(embedding_model: EmbeddingModel) -> Result<Self, EmbeddingError> {
        let model_name = format!("{:?}", embedding_model);

        let init_options = InitOptions::new(embedding_model);

        let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| EmbeddingError::Cancelled(e.to_string()))?
            .map_err(|e| EmbeddingError::Init(e.to_string()))?;

        // LRU cache for embeddings (max 1000 entries)
        let cache_size = NonZeroUsize::new(1000).expect("nonzero cache size");
        let cache = LruCache::new(cache_size);

        Ok(Self {
            model: Arc::new(RwLock::new(model)),
            cache: Arc::new(RwLock::new(cache)),
            model_name,
            dimension: EMBEDDING_DIMENSION,
        })
    }

    /// Embed a single text
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        {
            let mut cache = self.cache.write().await;
            if let Some(cached) = cache.get(text) {
                return Ok(cached.clone());
            }
        }

        let text_owned = text.to_string();
        let model = self.model.clone();

        let embeddings = tokio::task::spawn_blocking(move || {
            let model_guard = futures::executor::block_on(model.read());
            model_guard.embed(vec![text_owned], None)
        })
        .await
        .map_err(|e| EmbeddingError::Cancelled(e.to_string()))?
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let embedding = embeddings.into_iter().next().ok_or(EmbeddingError::Empty)?;

        {
            let mut cache = self.cache.write().await;
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    /// Embed multiple texts in batch (more efficient)
    pub async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        let mut to_embed = Vec::new();
        let mut to_embed_indices = Vec::new();

        // Check cache for each text
        {
            let mut cache = self.cache.write().await;
            for (i, text) in texts.iter().enumerate() {
                if let Some(cached) = cache.get(*text) {
                    results.push(cached.clone());
                } else {
                    to_embed.push(text.to_string());
                    to_embed_indices.push(i);
                    results.push(Vec::new()); // placeholder
                }
            }
        }

        if !to_embed.is_empty() {
            let model = self.model.clone();
            let to_embed_copy = to_embed.clone();

            let embeddings = tokio::task::spawn_blocking(move || {
                let model_guard = futures::executor::block_on(model.read());
                model_guard.embed(to_embed_copy, None)
            })
            .await
            .map_err(|e| EmbeddingError::Cancelled(e.to_string()))?
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

            if embeddings.len() != to_embed.len() {
                return Err(EmbeddingError::Empty);
            }

            let mut cache = self.cache.write().await;
            for (i, embedding) in embeddings.into_iter().enumerate() {
                let text = &to_embed[i];
                let idx = to_embed_indices[i];

                cache.put(text.clone(), embedding.clone());
                results[idx] = embedding;
            }
        }

        Ok(results)
    }

    /// Get model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Calculate cosine similarity between two embeddings
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    /// Normalize an embedding vector in place
    pub fn normalize(embedding: &mut [f32]) {
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in embedding.iter_mut() {
                *val /= norm;
            }
        }
    }

    /// Clear the cache
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get cache statistics (used entries, capacity)
    pub async fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.read().await;
        (cache.len(), cache.cap().get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_basics() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((EmbeddingEngine::cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(EmbeddingEngine::cosine_similarity(&a, &c).abs() < 1e-6);
        // mismatched dimensions score zero
        assert_eq!(EmbeddingEngine::cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        EmbeddingEngine::normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    #[ignore] // HEAVY: requires embedding model (~100MB download). Run manually: cargo test -- --ignored
    async fn embed_text_dimension() {
        let engine = EmbeddingEngine::new().await.unwrap();
        let embedding = engine.embed_text("This is a test sentence").await.unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    #[ignore] // Requires embedding model - run manually with: cargo test -- --ignored
    async fn embed_batch_uses_cache() {
        let engine = EmbeddingEngine::new().await.unwrap();

        let first = engine.embed_text("Cached text").await.unwrap();
        let second = engine.embed_text("Cached text").await.unwrap();
        assert_eq!(first, second);

        let (used, capacity) = engine.cache_stats().await;
        assert_eq!(used, 1);
        assert!(capacity > 0);
    }
}
