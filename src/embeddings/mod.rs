pub mod chunking;
pub mod hashing;
pub mod ollama;


use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, EmbeddingBackend};
use crate::database::Aggregation;

pub use chunking::{Chunk, Chunker, ChunkingConfig, chunk_text};
pub use hashing::HashingEmbedder;
pub use ollama::{OllamaClient, OllamaEmbedder};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyInput,
    #[error("Embedding backend failed: {0}")]
    Backend(String),
    #[error("Embedding has dimension {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Backend returned {found} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, found: usize },
    #[error("Failed to embed batch item {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<EmbeddingError>,
    },
}

/// An ordered sequence of equal-width vectors, one per token of the embedded text.
///
/// Dense backends produce a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiVector {
    rows: Vec<Vec<f32>>,
    dimension: usize,
}

impl MultiVector {
    /// Build from rows that must all have width `dimension`
    #[inline]
    pub fn new(rows: Vec<Vec<f32>>, dimension: usize) -> Result<Self, EmbeddingError> {
        if rows.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if let Some(row) = rows.iter().find(|row| row.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                found: row.len(),
            });
        }
        Ok(Self { rows, dimension })
    }

    /// Build from rows, taking the width from the first row
    #[inline]
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, EmbeddingError> {
        let dimension = rows.first().map(Vec::len).ok_or(EmbeddingError::EmptyInput)?;
        Self::new(rows, dimension)
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    #[inline]
    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of token vectors
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Maps text to a multi-vector.
///
/// Implementations must embed every text independently: batching may only change
/// throughput, never the vectors of an individual item.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Pinned identity of the model, compared against the collection it writes to
    fn model_id(&self) -> String;

    /// Width of every vector this embedder produces
    fn dimensionality(&self) -> usize;

    /// How per-token vectors are meant to be compared
    fn aggregation(&self) -> Aggregation {
        Aggregation::MaxSim
    }

    async fn embed(&self, text: &str) -> Result<MultiVector, EmbeddingError>;

    /// Embed `texts` in order, one multi-vector per input.
    ///
    /// The default embeds sequentially and tags a failure with the failing index.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<MultiVector>, EmbeddingError> {
        let mut results = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let embedding = self
                .embed(text)
                .await
                .map_err(|e| EmbeddingError::Item {
                    index,
                    source: Box::new(e),
                })?;
            results.push(embedding);
        }
        Ok(results)
    }
}

/// Construct the embedder selected in the configuration
#[inline]
pub fn build_embedder(config: &Config) -> crate::Result<Arc<dyn Embedder>> {
    let dimension = config.embedding.dimension as usize;
    let embedder: Arc<dyn Embedder> = match config.embedding.backend {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(dimension)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::from_config(config)?),
    };
    Ok(embedder)
}
