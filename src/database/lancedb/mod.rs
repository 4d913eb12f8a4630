// LanceDB vector database module
// One table per collection plus a registry table recording each collection's geometry

#[cfg(test)]
mod tests;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, ListArray, RecordBatchIterator,
    StringArray, UInt32Array, UInt64Array,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    ChunkPayload, Geometry, REGISTRY_NAME, ScoredRecord, VectorRecord, VectorStore,
    check_record_dimensions, is_valid_collection_name, scoring,
};
use crate::embeddings::MultiVector;
use crate::{DocsError, Result};

/// Persistent local store backed by LanceDB.
///
/// LanceDB has no native multi-vector search, so queries scan the collection and
/// score every record with max-sim.
pub struct LanceStore {
    connection: Connection,
}

impl LanceStore {
    /// Open (or create) the database directory at `db_path`
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            DocsError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("malformed") {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        DocsError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(DocsError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let store = Self { connection };
        store.initialize_registry().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    async fn initialize_registry(&self) -> Result<()> {
        if self.table_exists(REGISTRY_NAME).await? {
            return Ok(());
        }

        self.connection
            .create_empty_table(REGISTRY_NAME, registry_schema())
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to create registry table: {}", e)))?;

        debug!("Created collection registry table");
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|table| table == name))
    }

    async fn open_table(&self, name: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to open table '{}': {}", name, e)))
    }

    /// The geometry for `name`, or `CollectionNotFound`
    async fn require_geometry(&self, name: &str) -> Result<Geometry> {
        self.collection_geometry(name)
            .await?
            .ok_or_else(|| DocsError::CollectionNotFound(name.to_string()))
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                DocsError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    #[inline]
    fn backend(&self) -> &'static str {
        "lancedb"
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collection_geometry(name).await?.is_some())
    }

    async fn collection_geometry(&self, name: &str) -> Result<Option<Geometry>> {
        if !is_valid_collection_name(name) {
            return Err(DocsError::InvalidArgument(format!(
                "Invalid collection name: '{}'",
                name
            )));
        }

        let registry = self.open_table(REGISTRY_NAME).await?;
        let mut results = registry
            .query()
            .only_if(format!("name = '{}'", name))
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to query registry: {}", e)))?;

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to read registry stream: {}", e)))?
        {
            if let Some(geometry) = parse_registry_batch(&batch)?.into_iter().next() {
                return Ok(Some(geometry));
            }
        }

        Ok(None)
    }

    async fn create_collection(&self, name: &str, geometry: &Geometry) -> Result<()> {
        if self.collection_exists(name).await? {
            return Err(DocsError::CollectionAlreadyExists(name.to_string()));
        }

        // A table without a registry row is a leftover from an interrupted create
        if self.table_exists(name).await? {
            warn!("Dropping orphaned table '{}'", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| DocsError::Database(format!("Failed to drop table: {}", e)))?;
        }

        self.connection
            .create_empty_table(name, records_schema(geometry.dimension))
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to create table: {}", e)))?;

        let registry = self.open_table(REGISTRY_NAME).await?;
        let batch = registry_batch(name, geometry)?;
        let schema = batch.schema();
        registry
            .add(RecordBatchIterator::new(std::iter::once(Ok(batch)), schema))
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to register collection: {}", e)))?;

        info!("Created collection '{}' ({})", name, geometry);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<bool> {
        let existed = self.collection_exists(name).await?;

        if self.table_exists(name).await? {
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| DocsError::Database(format!("Failed to drop table: {}", e)))?;
        }

        let registry = self.open_table(REGISTRY_NAME).await?;
        registry
            .delete(&format!("name = '{}'", name))
            .await
            .map_err(|e| DocsError::Database(format!("Failed to unregister collection: {}", e)))?;

        if existed {
            info!("Dropped collection '{}'", name);
        }
        Ok(existed)
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let geometry = self.require_geometry(name).await?;
        if records.is_empty() {
            return Ok(());
        }
        check_record_dimensions(name, &geometry, records)?;

        let record_batch = records_batch(records, geometry.dimension)?;
        let table = self.open_table(name).await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to insert records: {}", e)))?;

        debug!("Stored {} records in '{}'", records.len(), name);
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: &MultiVector,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let geometry = self.require_geometry(name).await?;
        let table = self.open_table(name).await?;

        let total = table
            .count_rows(None)
            .await
            .map_err(|e| DocsError::Database(format!("Failed to count rows: {}", e)))?;
        if total == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let mut results = table
            .query()
            .limit(total)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to execute scan: {}", e)))?;

        let mut hits = Vec::with_capacity(total);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to read result stream: {}", e)))?
        {
            for (id, vectors, payload) in parse_records_batch(&batch)? {
                hits.push(ScoredRecord {
                    id,
                    score: scoring::max_sim(geometry.comparator, query, &vectors),
                    payload,
                });
            }
        }

        debug!("Scored {} records in '{}'", hits.len(), name);
        Ok(scoring::rank(hits, limit))
    }

    async fn count(&self, name: &str) -> Result<u64> {
        self.require_geometry(name).await?;
        let table = self.open_table(name).await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DocsError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

fn registry_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("dimension", DataType::UInt32, false),
        Field::new("comparator", DataType::Utf8, false),
        Field::new("aggregation", DataType::Utf8, false),
        Field::new("model", DataType::Utf8, true),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn token_vector_field(dimension: usize) -> Field {
    Field::new(
        "item",
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, false)),
            dimension as i32,
        ),
        false,
    )
}

fn records_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vectors",
            DataType::List(Arc::new(token_vector_field(dimension))),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("start_offset", DataType::UInt64, false),
        Field::new("end_offset", DataType::UInt64, false),
        Field::new("sequence_index", DataType::UInt64, false),
        Field::new("indexed_at", DataType::Utf8, false),
    ]))
}

fn registry_batch(name: &str, geometry: &Geometry) -> Result<RecordBatch> {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![name])),
        Arc::new(UInt32Array::from(vec![geometry.dimension as u32])),
        Arc::new(StringArray::from(vec![geometry.comparator.as_str()])),
        Arc::new(StringArray::from(vec![geometry.aggregation.as_str()])),
        Arc::new(StringArray::from(vec![geometry.model.as_deref()])),
        Arc::new(StringArray::from(vec![Utc::now().to_rfc3339()])),
    ];

    RecordBatch::try_new(registry_schema(), arrays)
        .map_err(|e| DocsError::Database(format!("Failed to create registry batch: {}", e)))
}

fn parse_registry_batch(batch: &RecordBatch) -> Result<Vec<Geometry>> {
    let dimensions = column::<UInt32Array>(batch, "dimension")?;
    let comparators = column::<StringArray>(batch, "comparator")?;
    let aggregations = column::<StringArray>(batch, "aggregation")?;
    let models = column::<StringArray>(batch, "model")?;

    (0..batch.num_rows())
        .map(|row| {
            Ok(Geometry {
                dimension: dimensions.value(row) as usize,
                comparator: comparators.value(row).parse()?,
                aggregation: aggregations.value(row).parse()?,
                model: (!models.is_null(row)).then(|| models.value(row).to_string()),
            })
        })
        .collect()
}

/// Create a RecordBatch from vector records
fn records_batch(records: &[VectorRecord], dimension: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut lengths = Vec::with_capacity(len);
    let mut flat_values = Vec::new();
    let mut texts = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut start_offsets = Vec::with_capacity(len);
    let mut end_offsets = Vec::with_capacity(len);
    let mut sequence_indexes = Vec::with_capacity(len);
    let mut indexed_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.to_string());
        lengths.push(record.vectors.len());
        for row in record.vectors.rows() {
            flat_values.extend_from_slice(row);
        }
        texts.push(record.payload.text.as_str());
        sources.push(record.payload.source.as_str());
        start_offsets.push(record.payload.start_offset as u64);
        end_offsets.push(record.payload.end_offset as u64);
        sequence_indexes.push(record.payload.sequence_index as u64);
        indexed_ats.push(record.payload.indexed_at.to_rfc3339());
    }

    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let token_vectors = FixedSizeListArray::try_new(
        item_field,
        dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| DocsError::Database(format!("Failed to create vector array: {}", e)))?;

    let vectors = ListArray::try_new(
        Arc::new(token_vector_field(dimension)),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(token_vectors),
        None,
    )
    .map_err(|e| DocsError::Database(format!("Failed to create multi-vector array: {}", e)))?;

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vectors),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt64Array::from(start_offsets)),
        Arc::new(UInt64Array::from(end_offsets)),
        Arc::new(UInt64Array::from(sequence_indexes)),
        Arc::new(StringArray::from(indexed_ats)),
    ];

    RecordBatch::try_new(records_schema(dimension), arrays)
        .map_err(|e| DocsError::Database(format!("Failed to create record batch: {}", e)))
}

fn parse_records_batch(batch: &RecordBatch) -> Result<Vec<(Uuid, MultiVector, ChunkPayload)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let vectors = column::<ListArray>(batch, "vectors")?;
    let texts = column::<StringArray>(batch, "text")?;
    let sources = column::<StringArray>(batch, "source")?;
    let start_offsets = column::<UInt64Array>(batch, "start_offset")?;
    let end_offsets = column::<UInt64Array>(batch, "end_offset")?;
    let sequence_indexes = column::<UInt64Array>(batch, "sequence_index")?;
    let indexed_ats = column::<StringArray>(batch, "indexed_at")?;

    let mut parsed = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let id = Uuid::parse_str(ids.value(row))
            .map_err(|e| DocsError::Database(format!("Invalid record id: {}", e)))?;
        let indexed_at = DateTime::parse_from_rfc3339(indexed_ats.value(row))
            .map_err(|e| DocsError::Database(format!("Invalid indexed_at value: {}", e)))?
            .with_timezone(&Utc);

        let payload = ChunkPayload {
            text: texts.value(row).to_string(),
            source: sources.value(row).to_string(),
            start_offset: start_offsets.value(row) as usize,
            end_offset: end_offsets.value(row) as usize,
            sequence_index: sequence_indexes.value(row) as usize,
            indexed_at,
        };

        parsed.push((id, parse_multi_vector(&vectors.value(row))?, payload));
    }

    Ok(parsed)
}

fn parse_multi_vector(array: &ArrayRef) -> Result<MultiVector> {
    let token_vectors = array
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| DocsError::Database("Invalid vectors column type".to_string()))?;

    let rows = (0..token_vectors.len())
        .map(|i| {
            token_vectors
                .value(i)
                .as_any()
                .downcast_ref::<Float32Array>()
                .map(|values| values.values().to_vec())
                .ok_or_else(|| DocsError::Database("Invalid vector element type".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MultiVector::from_rows(rows)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocsError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| DocsError::Database(format!("Invalid {} column type", name)))
}
