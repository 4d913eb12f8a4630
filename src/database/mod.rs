// Vector store backends holding collections of multi-vector records


pub mod lancedb;
pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod scoring;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::embeddings::{Chunk, Embedder, MultiVector};
use crate::{DocsError, Result};

/// Name reserved for the table recording collection geometry in local stores
pub const REGISTRY_NAME: &str = "docs_rag_collections";

/// Per-pair vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl Comparator {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclidean => "euclidean",
        }
    }
}

impl FromStr for Comparator {
    type Err = DocsError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(DocsError::Database(format!("Unknown comparator: {}", other))),
        }
    }
}

/// How per-token similarities combine into a record score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Sum over query vectors of the best match among the record's vectors
    #[default]
    MaxSim,
}

impl Aggregation {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxSim => "max_sim",
        }
    }
}

impl FromStr for Aggregation {
    type Err = DocsError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max_sim" => Ok(Self::MaxSim),
            other => Err(DocsError::Database(format!("Unknown aggregation: {}", other))),
        }
    }
}

/// The vector shape a collection is fixed to at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub dimension: usize,
    pub comparator: Comparator,
    pub aggregation: Aggregation,
    /// Embedding model identity; `None` when the backend cannot record it
    pub model: Option<String>,
}

impl Geometry {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            comparator: Comparator::Cosine,
            aggregation: Aggregation::MaxSim,
            model: None,
        }
    }

    /// Geometry matching everything `embedder` produces
    #[inline]
    pub fn for_embedder(embedder: &dyn Embedder) -> Self {
        Self {
            dimension: embedder.dimensionality(),
            comparator: Comparator::Cosine,
            aggregation: embedder.aggregation(),
            model: Some(embedder.model_id()),
        }
    }

    #[inline]
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether records shaped like `self` may go into a collection shaped like `existing`.
    ///
    /// Model identity only counts when both sides know it.
    #[inline]
    pub fn is_compatible_with(&self, existing: &Self) -> bool {
        let models_agree = match (&self.model, &existing.model) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        };

        self.dimension == existing.dimension
            && self.comparator == existing.comparator
            && self.aggregation == existing.aggregation
            && models_agree
    }

    #[inline]
    pub fn check(
        &self,
        collection: &str,
        existing: &Self,
    ) -> std::result::Result<(), GeometryMismatch> {
        if self.is_compatible_with(existing) {
            Ok(())
        } else {
            Err(GeometryMismatch {
                collection: collection.to_string(),
                expected: self.clone(),
                found: existing.clone(),
            })
        }
    }
}

impl fmt::Display for Geometry {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dimension {}, {}, {}",
            self.dimension,
            self.comparator.as_str(),
            self.aggregation.as_str()
        )?;
        if let Some(model) = &self.model {
            write!(f, ", model {}", model)?;
        }
        Ok(())
    }
}

/// An embedder and a collection disagree on vector geometry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("collection '{collection}' has {found}, but the embedder produces {expected}")]
pub struct GeometryMismatch {
    pub collection: String,
    pub expected: Geometry,
    pub found: Geometry,
}

/// Provenance stored alongside every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub source: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: usize,
    pub indexed_at: DateTime<Utc>,
}

impl ChunkPayload {
    #[inline]
    pub fn from_chunk(chunk: &Chunk, indexed_at: DateTime<Utc>) -> Self {
        Self {
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
            sequence_index: chunk.sequence_index,
            indexed_at,
        }
    }
}

/// The persisted unit: one chunk's multi-vector and payload under a generated key
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vectors: MultiVector,
    pub payload: ChunkPayload,
}

impl VectorRecord {
    #[inline]
    pub fn new(chunk: &Chunk, vectors: MultiVector, indexed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vectors,
            payload: ChunkPayload::from_chunk(chunk, indexed_at),
        }
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: Uuid,
    pub payload: ChunkPayload,
    pub score: f32,
}

/// Letters, digits, `_` and `-`, at most 128 characters, and not the registry name
#[inline]
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name != REGISTRY_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Operations every vector store backend provides.
///
/// Collections are fixed to a [`Geometry`] when created. Reads are safe for any number
/// of concurrent callers; each `upsert` call is an independent unit of work.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Geometry of an existing collection, `None` when it does not exist
    async fn collection_geometry(&self, name: &str) -> Result<Option<Geometry>>;

    /// Create an empty collection; fails with `CollectionAlreadyExists` if present
    async fn create_collection(&self, name: &str, geometry: &Geometry) -> Result<()>;

    /// Remove a collection and all of its records; returns whether it existed
    async fn drop_collection(&self, name: &str) -> Result<bool>;

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()>;

    /// Up to `limit` records ranked by aggregate similarity, best first
    async fn search(
        &self,
        name: &str,
        query: &MultiVector,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;

    async fn count(&self, name: &str) -> Result<u64>;
}

/// Reject records whose vectors do not fit the collection
#[inline]
pub fn check_record_dimensions(
    name: &str,
    geometry: &Geometry,
    records: &[VectorRecord],
) -> Result<()> {
    if let Some(record) = records
        .iter()
        .find(|record| record.vectors.dimension() != geometry.dimension)
    {
        return Err(DocsError::Database(format!(
            "Record {} has dimension {}, collection '{}' expects {}",
            record.id,
            record.vectors.dimension(),
            name,
            geometry.dimension
        )));
    }
    Ok(())
}

/// Open the store selected in the configuration
#[inline]
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(memory::MemoryStore::new()),
        StoreBackend::Lancedb => {
            Arc::new(self::lancedb::LanceStore::open(&config.vector_database_path()).await?)
        }
        StoreBackend::Qdrant => open_qdrant(config)?,
    };

    info!("Opened {} vector store", store.backend());
    Ok(store)
}

#[cfg(feature = "qdrant")]
fn open_qdrant(config: &Config) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(qdrant::QdrantStore::new(&config.store.qdrant_url)?))
}

#[cfg(not(feature = "qdrant"))]
fn open_qdrant(_config: &Config) -> Result<Arc<dyn VectorStore>> {
    Err(DocsError::Config(
        "The qdrant store backend requires building with the `qdrant` feature".to_string(),
    ))
}
