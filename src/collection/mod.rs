#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::{Geometry, VectorStore, is_valid_collection_name};
use crate::{DocsError, Result};

/// What `ensure` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Existing,
}

/// A snapshot of one collection for status output
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStatus {
    pub name: String,
    pub backend: &'static str,
    pub geometry: Option<Geometry>,
    pub records: u64,
}

/// Creates and verifies named collections on a vector store
#[derive(Clone)]
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    #[inline]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    #[inline]
    pub async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        self.store.collection_exists(name).await
    }

    #[inline]
    pub async fn geometry(&self, name: &str) -> Result<Option<Geometry>> {
        validate_name(name)?;
        self.store.collection_geometry(name).await
    }

    /// Create `name` with `geometry`.
    ///
    /// An existing collection is an error unless `recreate` is set, in which case it is
    /// dropped along with all of its records first.
    #[inline]
    pub async fn create(&self, name: &str, geometry: &Geometry, recreate: bool) -> Result<()> {
        validate_name(name)?;

        if self.store.collection_exists(name).await? {
            if !recreate {
                return Err(DocsError::CollectionAlreadyExists(name.to_string()));
            }
            warn!("Recreating collection '{}', discarding its records", name);
            self.store.drop_collection(name).await?;
        }

        self.store.create_collection(name, geometry).await?;
        info!("Collection '{}' ready ({})", name, geometry);
        Ok(())
    }

    /// Check-then-create: reuse a compatible collection, create a missing one, and refuse
    /// one whose geometry differs
    #[inline]
    pub async fn ensure(&self, name: &str, geometry: &Geometry) -> Result<Ensured> {
        validate_name(name)?;

        if let Some(existing) = self.store.collection_geometry(name).await? {
            geometry.check(name, &existing)?;
            debug!("Reusing collection '{}' ({})", name, existing);
            return Ok(Ensured::Existing);
        }

        match self.store.create_collection(name, geometry).await {
            Ok(()) => {
                info!("Created collection '{}' ({})", name, geometry);
                Ok(Ensured::Created)
            }
            // Another writer created it between the check and the create
            Err(DocsError::CollectionAlreadyExists(_)) => {
                let existing = self
                    .store
                    .collection_geometry(name)
                    .await?
                    .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))?;
                geometry.check(name, &existing)?;
                Ok(Ensured::Existing)
            }
            Err(e) => Err(e),
        }
    }

    #[inline]
    pub async fn drop(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        self.store.drop_collection(name).await
    }

    #[inline]
    pub async fn status(&self, name: &str) -> Result<CollectionStatus> {
        let geometry = self.geometry(name).await?;
        let records = if geometry.is_some() {
            self.store.count(name).await?
        } else {
            0
        };

        Ok(CollectionStatus {
            name: name.to_string(),
            backend: self.store.backend(),
            geometry,
            records,
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if is_valid_collection_name(name) {
        Ok(())
    } else {
        Err(DocsError::InvalidArgument(format!(
            "Invalid collection name: '{}'",
            name
        )))
    }
}
