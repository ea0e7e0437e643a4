//! Faro - Advanced Retrieval Engine
//!
//! Faro responde preguntas sobre un corpus de documentos recuperando los
//! pasajes más relevantes antes de llamar al modelo de lenguaje, con dos
//! estrategias avanzadas sobre un índice vectorial base y un arnés de
//! evaluación integrado.
//!
//! # Arquitectura
//!
//! - **Auto-Merging Retrieval**: el documento se indexa en varios niveles de
//!   granularidad; cuando suficientes fragmentos hermanos aparecen juntos en
//!   los resultados, se promocionan a su nodo padre
//! - **Sentence-Window Retrieval**: se indexan oraciones individuales para
//!   una coincidencia precisa, pero la síntesis recibe la ventana de
//!   oraciones circundantes
//! - **Evaluation Harness**: cada consulta se registra y se puntúa con
//!   métricas de feedback sin referencia (answer relevance, context
//!   relevance, groundedness) agregadas en un leaderboard comparativo
//!
//! # Módulos Principales
//!
//! - [`chunking`] - Chunker jerárquico e indexador de ventanas de oraciones
//! - [`index`] - Índice de similitud con persistencia opaca
//! - [`retrieval`] - Estrategias de recuperación intercambiables
//! - [`synthesis`] - Orquestación de consulta y síntesis de respuesta
//! - [`eval`] - Trazas, feedback y leaderboard
//!
//! # Ejemplo de Uso
//!
//! ```rust,no_run
//! use faro::config::EngineConfig;
//! use faro::pipeline::RagPipeline;
//! use faro::retrieval::Strategy;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let mut pipeline = RagPipeline::new(config).await?;
//!
//! let text = std::fs::read_to_string("ebook.txt")?;
//! pipeline.build(&text, Strategy::AutoMerging).await?;
//!
//! let response = pipeline
//!     .query("How do I get started?", Strategy::AutoMerging, 6)
//!     .await?;
//! println!("{}", response.answer);
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod eval;
pub mod index;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod synthesis;

pub use config::EngineConfig;
pub use embedding::EmbeddingEngine;
pub use eval::{EvalRecorder, JudgeScorer, TraceRecord, TraceStore};
pub use index::SearchIndex;
pub use pipeline::RagPipeline;
pub use retrieval::{Retriever, Strategy};
pub use store::{Node, NodeId, NodeStore};
pub use synthesis::{QueryEngine, QueryResponse};
