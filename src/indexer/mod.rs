// Indexer module
// Chunks documents, embeds them in batches and writes the records into a collection


use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::collection::{CollectionManager, Ensured};
use crate::config::Config;
use crate::database::{Geometry, VectorRecord, VectorStore};
use crate::documents::Document;
use crate::embeddings::{Chunk, Chunker, Embedder, EmbeddingError};
use crate::{DocsError, Result};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_UPSERT_RETRIES: u32 = 3;

/// A batch that could not be embedded or written after every retry.
///
/// Chunk numbers are positions in the run's full chunk sequence, so the batch can be
/// retried with `IndexOptions::resume_from`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Batch {batch} (chunks {first_chunk}..={last_chunk} from {}) failed after {attempts} attempts: {message}",
    .sources.join(", ")
)]
pub struct IndexingError {
    pub batch: usize,
    pub first_chunk: usize,
    pub last_chunk: usize,
    pub sources: Vec<String>,
    pub attempts: u32,
    pub message: String,
}

/// A chunk left out because it could not be embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChunk {
    pub chunk: usize,
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Drop and recreate the collection before writing
    pub recreate: bool,
    /// First batch to process; earlier batches are assumed to be written already
    pub resume_from: usize,
}

/// Outcome of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub collection: String,
    pub documents: usize,
    pub chunks_total: usize,
    pub batches_total: usize,
    pub batches_written: usize,
    pub records_written: usize,
    pub created_collection: bool,
    pub skipped: Vec<SkippedChunk>,
    pub failed: Vec<IndexingError>,
}

impl IndexReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Turn the first failed batch into an error
    #[inline]
    pub fn ensure_complete(self) -> Result<Self> {
        match self.failed.first() {
            Some(failure) => Err(DocsError::Indexing(failure.clone())),
            None => Ok(self),
        }
    }
}

struct Batch<'a> {
    number: usize,
    first: usize,
    chunks: &'a [Chunk],
}

impl Batch<'_> {
    fn last(&self) -> usize {
        self.first + self.chunks.len().saturating_sub(1)
    }

    fn sources(&self) -> Vec<String> {
        self.chunks
            .iter()
            .map(|chunk| chunk.source.clone())
            .unique()
            .collect()
    }

    fn failure(&self, attempts: u32, message: String) -> IndexingError {
        IndexingError {
            batch: self.number,
            first_chunk: self.first,
            last_chunk: self.last(),
            sources: self.sources(),
            attempts,
            message,
        }
    }
}

/// Populates a collection from documents
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    collections: CollectionManager,
    chunker: Chunker,
    batch_size: usize,
    concurrency: usize,
    upsert_retries: u32,
    retry_delay: Duration,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, chunker: Chunker) -> Self {
        Self {
            embedder,
            collections: CollectionManager::new(store),
            chunker,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            upsert_retries: DEFAULT_UPSERT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            show_progress: false,
        }
    }

    /// Build an indexer with the chunking, batching and retry settings from `config`
    #[inline]
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.chunking.clone())?;

        Ok(Self::new(embedder, store, chunker)
            .with_batch_size(config.embedding.batch_size as usize)
            .with_concurrency(config.embedding.concurrency as usize)
            .with_upsert_retries(config.store.upsert_retries))
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// How many batches may be embedded at once
    #[inline]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Retries after the first failed embedding call or upsert of a batch
    #[inline]
    pub fn with_upsert_retries(mut self, retries: u32) -> Self {
        self.upsert_retries = retries;
        self
    }

    /// Delay before the first retry; later retries double it
    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Geometry every collection written by this indexer must have
    #[inline]
    pub fn geometry(&self) -> Geometry {
        Geometry::for_embedder(self.embedder.as_ref())
    }

    /// All chunks of `documents`, document by document
    #[inline]
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| self.chunker.chunk_document(document))
            .collect()
    }

    #[inline]
    pub async fn index(&self, documents: &[Document], collection: &str) -> Result<IndexReport> {
        self.index_with(documents, collection, &IndexOptions::default())
            .await
    }

    /// Index `documents` into `collection`.
    ///
    /// Collection errors, including a geometry mismatch, are returned before anything is
    /// written. Batch failures after that point are collected in the report and do not
    /// undo batches that were already written.
    #[inline]
    pub async fn index_with(
        &self,
        documents: &[Document],
        collection: &str,
        options: &IndexOptions,
    ) -> Result<IndexReport> {
        if options.recreate && options.resume_from > 0 {
            return Err(DocsError::InvalidArgument(
                "Cannot resume into a collection that is being recreated".to_string(),
            ));
        }

        let chunks = self.chunk_documents(documents);
        info!(
            "Indexing {} chunks from {} documents into '{}'",
            chunks.len(),
            documents.len(),
            collection
        );

        let geometry = self.geometry();
        let created_collection = if options.recreate {
            self.collections.create(collection, &geometry, true).await?;
            true
        } else {
            self.collections.ensure(collection, &geometry).await? == Ensured::Created
        };

        let batches: Vec<Batch<'_>> = chunks
            .chunks(self.batch_size)
            .enumerate()
            .map(|(number, chunks)| Batch {
                number,
                first: number * self.batch_size,
                chunks,
            })
            .collect();

        let mut report = IndexReport {
            collection: collection.to_string(),
            documents: documents.len(),
            chunks_total: chunks.len(),
            batches_total: batches.len(),
            created_collection,
            ..IndexReport::default()
        };

        let pending: Vec<Batch<'_>> = batches
            .into_iter()
            .filter(|batch| batch.number >= options.resume_from)
            .collect();
        if options.resume_from > 0 {
            info!(
                "Resuming at batch {}, {} batches left",
                options.resume_from,
                pending.len()
            );
        }

        let bar = self.progress_bar(pending.len() as u64, collection);

        let mut embedded = stream::iter(pending)
            .map(|batch| async move {
                let embedded = self.embed_batch(&batch).await;
                (batch, embedded)
            })
            .buffered(self.concurrency);

        while let Some((batch, embedded)) = embedded.next().await {
            let outcome = match embedded {
                Ok((records, skipped)) => {
                    report.skipped.extend(skipped);
                    self.upsert_with_retry(collection, &batch, &records)
                        .await
                        .map(|()| records.len())
                }
                Err(failure) => Err(failure),
            };

            match outcome {
                Ok(written) => {
                    report.batches_written += 1;
                    report.records_written += written;
                    debug!(
                        "Wrote batch {} ({} records) to '{}'",
                        batch.number, written, collection
                    );
                }
                Err(failure) => report.failed.push(failure),
            }

            bar.inc(1);
        }

        bar.finish_and_clear();

        info!(
            "Indexed {} of {} chunks into '{}' ({} batches failed, {} chunks skipped)",
            report.records_written,
            report.chunks_total,
            collection,
            report.failed.len(),
            report.skipped.len()
        );

        Ok(report)
    }

    /// Embed a batch in one call.
    ///
    /// Backend failures retry the whole batch. A failure the backend pins on one item
    /// falls back to one call per chunk, skipping the chunks that still fail.
    async fn embed_batch(
        &self,
        batch: &Batch<'_>,
    ) -> std::result::Result<(Vec<VectorRecord>, Vec<SkippedChunk>), IndexingError> {
        let texts: Vec<String> = batch.chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let indexed_at = Utc::now();
        let max_attempts = self.upsert_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == batch.chunks.len() => {
                    let records = batch
                        .chunks
                        .iter()
                        .zip(vectors)
                        .map(|(chunk, vectors)| VectorRecord::new(chunk, vectors, indexed_at))
                        .collect();
                    return Ok((records, Vec::new()));
                }
                Ok(vectors) => EmbeddingError::CountMismatch {
                    expected: batch.chunks.len(),
                    found: vectors.len(),
                },
                Err(e @ EmbeddingError::Item { .. }) => {
                    warn!(
                        "Batch {} failed to embed ({}), embedding individually",
                        batch.number, e
                    );
                    return self.embed_individually(batch, indexed_at).await;
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                error!(
                    "Giving up on embedding batch {} after {} attempts: {}",
                    batch.number, attempt, error
                );
                return Err(batch.failure(attempt, error.to_string()));
            }

            let delay = self.backoff(attempt);
            warn!(
                "Embedding of batch {} failed ({}), attempt {}/{}, retrying in {:?}",
                batch.number, error, attempt, max_attempts, delay
            );
            sleep(delay).await;
        }
    }

    /// Embed chunk by chunk; the batch fails when no chunk could be embedded
    async fn embed_individually(
        &self,
        batch: &Batch<'_>,
        indexed_at: DateTime<Utc>,
    ) -> std::result::Result<(Vec<VectorRecord>, Vec<SkippedChunk>), IndexingError> {
        let mut records = Vec::with_capacity(batch.chunks.len());
        let mut skipped = Vec::new();

        for (offset, chunk) in batch.chunks.iter().enumerate() {
            match self.embedder.embed(&chunk.text).await {
                Ok(vectors) => records.push(VectorRecord::new(chunk, vectors, indexed_at)),
                Err(e) => {
                    warn!(
                        "Skipping chunk {} of {}: {}",
                        chunk.sequence_index, chunk.source, e
                    );
                    skipped.push(SkippedChunk {
                        chunk: batch.first + offset,
                        source: chunk.source.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if records.is_empty() {
            let reason = skipped
                .last()
                .map(|chunk| chunk.reason.clone())
                .unwrap_or_default();
            error!("No chunk of batch {} could be embedded", batch.number);
            return Err(batch.failure(1, format!("no chunk could be embedded: {reason}")));
        }

        Ok((records, skipped))
    }

    async fn upsert_with_retry(
        &self,
        collection: &str,
        batch: &Batch<'_>,
        records: &[VectorRecord],
    ) -> std::result::Result<(), IndexingError> {
        let max_attempts = self.upsert_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.collections.store().upsert(collection, records).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                error!(
                    "Giving up on batch {} after {} attempts: {}",
                    batch.number, attempt, error
                );
                return Err(batch.failure(attempt, error.to_string()));
            }

            let delay = self.backoff(attempt);
            warn!(
                "Upsert of batch {} failed ({}), attempt {}/{}, retrying in {:?}",
                batch.number, error, attempt, max_attempts, delay
            );
            sleep(delay).await;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * EXPONENTIAL_BACKOFF_BASE.pow(attempt.saturating_sub(1))
    }

    fn progress_bar(&self, len: u64, collection: &str) -> ProgressBar {
        if !(self.show_progress && console::user_attended_stderr()) {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len).with_style(
            ProgressStyle::with_template("{spinner} {bar:40} [{pos}/{len}] Indexing {msg}")
                .expect("style template is valid"),
        );
        bar.set_message(collection.to_string());
        bar
    }
}
