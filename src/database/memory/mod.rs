#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    Geometry, ScoredRecord, VectorRecord, VectorStore, check_record_dimensions, scoring,
};
use crate::embeddings::MultiVector;
use crate::{DocsError, Result};

#[derive(Debug)]
struct Collection {
    geometry: Geometry,
    records: Vec<VectorRecord>,
}

/// In-process store; contents live as long as the value
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    #[inline]
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn collection_geometry(&self, name: &str) -> Result<Option<Geometry>> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|collection| collection.geometry.clone()))
    }

    async fn create_collection(&self, name: &str, geometry: &Geometry) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(DocsError::CollectionAlreadyExists(name.to_string()));
        }

        collections.insert(
            name.to_string(),
            Collection {
                geometry: geometry.clone(),
                records: Vec::new(),
            },
        );
        debug!("Created in-memory collection '{}' ({})", name, geometry);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))?;

        check_record_dimensions(name, &collection.geometry, records)?;
        collection.records.extend_from_slice(records);
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: &MultiVector,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))?;

        let comparator = collection.geometry.comparator;
        let hits = collection
            .records
            .iter()
            .map(|record| ScoredRecord {
                id: record.id,
                payload: record.payload.clone(),
                score: scoring::max_sim(comparator, query, &record.vectors),
            })
            .collect();

        Ok(scoring::rank(hits, limit))
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))?;
        Ok(collection.records.len() as u64)
    }
}
