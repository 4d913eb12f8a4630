// Qdrant backend with native MaxSim multi-vector collections


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors::VectorsOptions;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, MultiVectorComparator,
    MultiVectorConfig, PointStruct, Query, QueryPointsBuilder, ScoredPoint,
    UpsertPointsBuilder, Value as QdrantValue, Vector, VectorInput, VectorParamsBuilder, Vectors,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    Aggregation, ChunkPayload, Comparator, Geometry, ScoredRecord, VectorRecord, VectorStore,
    check_record_dimensions,
};
use crate::embeddings::MultiVector;
use crate::{DocsError, Result};

/// Store backed by a Qdrant server reached over gRPC
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    #[inline]
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(map_err)?;
        Ok(Self { client })
    }

    async fn require_geometry(&self, name: &str) -> Result<Geometry> {
        self.collection_geometry(name)
            .await?
            .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))
    }
}

fn map_err(e: QdrantError) -> DocsError {
    DocsError::Database(format!("Qdrant request failed: {}", e))
}

#[async_trait]
impl VectorStore for QdrantStore {
    #[inline]
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(map_err)
    }

    async fn collection_geometry(&self, name: &str) -> Result<Option<Geometry>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(name).await.map_err(map_err)?;
        let params = info
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);

        let Some(VectorsConfigKind::Params(params)) = params else {
            return Err(DocsError::Database(format!(
                "Collection '{}' does not use a single unnamed vector",
                name
            )));
        };

        let comparator = match Distance::try_from(params.distance) {
            Ok(Distance::Cosine) => Comparator::Cosine,
            Ok(Distance::Dot) => Comparator::Dot,
            Ok(Distance::Euclid) => Comparator::Euclidean,
            _ => {
                return Err(DocsError::Database(format!(
                    "Collection '{}' uses an unsupported distance",
                    name
                )));
            }
        };

        if params.multivector_config.is_none() {
            return Err(DocsError::Database(format!(
                "Collection '{}' is not a multi-vector collection",
                name
            )));
        }

        Ok(Some(Geometry {
            dimension: params.size as usize,
            comparator,
            aggregation: Aggregation::MaxSim,
            model: None,
        }))
    }

    async fn create_collection(&self, name: &str, geometry: &Geometry) -> Result<()> {
        if self.collection_exists(name).await? {
            return Err(DocsError::CollectionAlreadyExists(name.to_string()));
        }

        let distance = match geometry.comparator {
            Comparator::Cosine => Distance::Cosine,
            Comparator::Dot => Distance::Dot,
            Comparator::Euclidean => Distance::Euclid,
        };
        let multivector = match geometry.aggregation {
            Aggregation::MaxSim => MultiVectorConfig {
                comparator: MultiVectorComparator::MaxSim.into(),
            },
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(
                        VectorParamsBuilder::new(geometry.dimension as u64, distance)
                            .multivector_config(multivector),
                    )
                    .on_disk_payload(true),
            )
            .await
            .map_err(map_err)?;

        info!("Created qdrant collection '{}' ({})", name, geometry);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<bool> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }
        self.client.delete_collection(name).await.map_err(map_err)?;
        info!("Dropped qdrant collection '{}'", name);
        Ok(true)
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let geometry = self.require_geometry(name).await?;
        if records.is_empty() {
            return Ok(());
        }
        check_record_dimensions(name, &geometry, records)?;

        let points = records
            .iter()
            .map(to_point)
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(map_err)?;

        debug!("Upserted {} points into '{}'", records.len(), name);
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: &MultiVector,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        self.require_geometry(name).await?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .query(
                QueryPointsBuilder::new(name)
                    .query(Query::new_nearest(VectorInput::new_multi(
                        query.rows().to_vec(),
                    )))
                    .limit(limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(map_err)?;

        response.result.into_iter().map(from_scored_point).collect()
    }

    async fn count(&self, name: &str) -> Result<u64> {
        self.require_geometry(name).await?;
        let response = self
            .client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(map_err)?;

        Ok(response.result.map_or(0, |result| result.count))
    }
}

fn to_point(record: &VectorRecord) -> Result<PointStruct> {
    let payload_json = serde_json::to_value(&record.payload)
        .map_err(|e| DocsError::Database(format!("Failed to serialize payload: {}", e)))?;
    let payload = Payload::try_from(payload_json)
        .map_err(|e| DocsError::Database(format!("Failed to build payload: {}", e)))?;

    let vectors = Vectors {
        vectors_options: Some(VectorsOptions::Vector(Vector::new_multi(
            record.vectors.rows().to_vec(),
        ))),
    };

    Ok(PointStruct::new(record.id.to_string(), vectors, payload))
}

fn from_scored_point(point: ScoredPoint) -> Result<ScoredRecord> {
    let id = match point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => Uuid::parse_str(&uuid)
            .map_err(|e| DocsError::Database(format!("Invalid point id: {}", e)))?,
        _ => return Err(DocsError::Database("Point without a UUID id".to_string())),
    };

    let payload = &point.payload;
    let indexed_at = DateTime::parse_from_rfc3339(&string_field(payload, "indexed_at")?)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| DocsError::Database(format!("Invalid indexed_at value: {}", e)))?;

    Ok(ScoredRecord {
        id,
        payload: ChunkPayload {
            text: string_field(payload, "text")?,
            source: string_field(payload, "source")?,
            start_offset: integer_field(payload, "start_offset")?,
            end_offset: integer_field(payload, "end_offset")?,
            sequence_index: integer_field(payload, "sequence_index")?,
            indexed_at,
        },
        score: point.score,
    })
}

fn field<'a>(payload: &'a HashMap<String, QdrantValue>, key: &str) -> Result<&'a Kind> {
    payload
        .get(key)
        .and_then(|value| value.kind.as_ref())
        .ok_or_else(|| DocsError::Database(format!("Payload field '{}' is missing", key)))
}

fn string_field(payload: &HashMap<String, QdrantValue>, key: &str) -> Result<String> {
    match field(payload, key)? {
        Kind::StringValue(s) => Ok(s.clone()),
        other => Err(DocsError::Database(format!(
            "Payload field '{}' is not a string: {:?}",
            key, other
        ))),
    }
}

fn integer_field(payload: &HashMap<String, QdrantValue>, key: &str) -> Result<usize> {
    let invalid = |value: &dyn std::fmt::Debug| {
        DocsError::Database(format!(
            "Payload field '{}' is not a non-negative integer: {:?}",
            key, value
        ))
    };

    match field(payload, key)? {
        Kind::IntegerValue(i) => usize::try_from(*i).map_err(|_| invalid(i)),
        Kind::DoubleValue(d) if d.fract() == 0.0 && *d >= 0.0 => Ok(*d as usize),
        other => Err(invalid(other)),
    }
}
