
use std::sync::Arc;
use tracing::{debug, info};

use crate::collection::CollectionManager;
use crate::database::{Geometry, ScoredRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::{DocsError, Result};

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
    pub sequence_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl From<ScoredRecord> for RetrievedChunk {
    #[inline]
    fn from(record: ScoredRecord) -> Self {
        Self {
            text: record.payload.text,
            source: record.payload.source,
            score: record.score,
            sequence_index: record.payload.sequence_index,
            start_offset: record.payload.start_offset,
            end_offset: record.payload.end_offset,
        }
    }
}

/// Query-time normalization. Indexed text is embedded as-is, so this only helps with
/// case-insensitive embedders.
#[inline]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Late-interaction search over a collection
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    collections: CollectionManager,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            collections: CollectionManager::new(store),
        }
    }

    /// The `k` best chunks for `query`, best first.
    ///
    /// Fewer than `k` are returned when the collection is smaller. The collection must
    /// exist and match the embedder's geometry.
    #[inline]
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(DocsError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        if collection.is_empty() {
            return Err(DocsError::InvalidArgument(
                "Collection name cannot be empty".to_string(),
            ));
        }

        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(DocsError::InvalidArgument(
                "Query cannot be empty".to_string(),
            ));
        }

        let existing = self
            .collections
            .geometry(collection)
            .await?
            .ok_or_else(|| DocsError::CollectionNotFound(collection.to_string()))?;
        Geometry::for_embedder(self.embedder.as_ref()).check(collection, &existing)?;

        let query_vectors = self.embedder.embed(&normalized).await?;
        debug!(
            "Query embedded into {} vectors of dimension {}",
            query_vectors.len(),
            query_vectors.dimension()
        );

        let hits = self
            .collections
            .store()
            .search(collection, &query_vectors, k)
            .await?;

        info!("Retrieved {} chunks from '{}'", hits.len(), collection);
        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}
