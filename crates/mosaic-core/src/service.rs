//! The image service: ingestion lifecycle, edits and search over a catalog.
//!
//! Ingestion runs in two stages. The upload stage resolves the source to
//! bytes, sniffs the media type and stores the object (`UPLOADED`). The
//! analyze stage fingerprints the bytes and marks the record `COMPLETE`. A
//! failure in either stage leaves the record in `ERROR` and surfaces the
//! error that caused it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{MosaicError, Result, StoreError};
use crate::pipeline::{Analyzer, SourceFetcher, Validator};
use crate::search::{IndexCache, SearchQuery, SimilaritySearch};
use crate::store::{MetadataStore, ObjectStore};
use crate::types::{
    DistanceResult, ImageId, ImageRecord, ImageStatus, ImageUpdate, NewImage, SourceReference,
};

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MosaicError::Canceled),
        out = fut => Ok(out),
    }
}

/// Owns the store handles and drives every operation on image records.
pub struct ImageService {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn SourceFetcher>,
    analyzer: Analyzer,
    validator: Validator,
    search: SimilaritySearch,
    cache: Option<Arc<IndexCache>>,
}

impl ImageService {
    /// Build a service over the given backends.
    ///
    /// An index cache is created when `search.index_cache_ttl_ms` is non-zero.
    pub fn new(
        config: &Config,
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        let cache = (config.search.index_cache_ttl_ms > 0).then(|| {
            Arc::new(IndexCache::new(Duration::from_millis(
                config.search.index_cache_ttl_ms,
            )))
        });

        let mut search = SimilaritySearch::new(Arc::clone(&metadata), config);
        if let Some(cache) = &cache {
            search = search.with_cache(Arc::clone(cache));
        }

        Self {
            metadata,
            objects,
            fetcher,
            analyzer: Analyzer::new(config),
            validator: Validator::new(config.limits.clone()),
            search,
            cache,
        }
    }

    /// Register a new image and ingest it.
    ///
    /// The PENDING record is written before ingestion starts, so a failed
    /// ingest still leaves an ERROR record behind.
    pub async fn create(&self, new: NewImage, cancel: &CancellationToken) -> Result<ImageRecord> {
        let mut record = ImageRecord::new(new.source);
        record.title = new.title;
        record.alt_text = new.alt_text;
        record.tags = new.tags;

        self.commit(&mut record).await?;
        tracing::debug!("Created {} from {}", record.id, record.source);

        self.ingest(record, cancel).await
    }

    /// Run both ingestion stages for `record`.
    pub async fn ingest(
        &self,
        mut record: ImageRecord,
        cancel: &CancellationToken,
    ) -> Result<ImageRecord> {
        let start = Instant::now();

        let bytes = match self.upload(&mut record, cancel).await {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(record, e).await,
        };

        match self.analyze_stage(record.clone(), &bytes, cancel).await {
            Ok(record) => {
                tracing::info!(
                    "Ingested {} ({}, {}x{}) in {:?}",
                    record.id,
                    record.file_name,
                    record.width,
                    record.height,
                    start.elapsed()
                );
                Ok(record)
            }
            Err(e) => self.fail(record, e).await,
        }
    }

    /// Patch an existing record.
    ///
    /// A new source re-runs ingestion. Otherwise the record is only written
    /// (with a new version id) when a content-significant field changed.
    pub async fn update(
        &self,
        id: &ImageId,
        update: ImageUpdate,
        cancel: &CancellationToken,
    ) -> Result<ImageRecord> {
        let current = self.metadata.read_one(id).await?;
        let mut next = current.clone();

        if let Some(title) = update.title {
            next.title = title;
        }
        if let Some(alt_text) = update.alt_text {
            next.alt_text = alt_text;
        }
        if let Some(tags) = update.tags {
            next.tags = tags;
        }

        if let Some(source) = update.source {
            next.source = source;
            return self.ingest(next, cancel).await;
        }

        if next.same_content(&current) {
            tracing::debug!("Update of {id} changed nothing");
            return Ok(current);
        }

        self.commit(&mut next).await?;
        Ok(next)
    }

    /// Re-run analysis for an existing record.
    ///
    /// Uses the stored object when there is one, and falls back to a full
    /// ingest from the record's source otherwise.
    pub async fn reanalyze(&self, id: &ImageId, cancel: &CancellationToken) -> Result<ImageRecord> {
        let record = self.metadata.read_one(id).await?;

        let stored = !record.file_name.is_empty() && self.objects.exists(&record.file_name).await?;
        if !stored {
            tracing::debug!("No stored object for {id}, re-ingesting from source");
            return self.ingest(record, cancel).await;
        }

        let fetched = cancellable(cancel, self.objects.get(&record.file_name)).await;
        let bytes = match fetched {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return self.fail(record, e.into()).await,
            Err(e) => return self.fail(record, e).await,
        };

        match self.analyze_stage(record.clone(), &bytes, cancel).await {
            Ok(record) => Ok(record),
            Err(e) => self.fail(record, e).await,
        }
    }

    /// Fetch one record.
    pub async fn get(&self, id: &ImageId) -> Result<ImageRecord> {
        Ok(self.metadata.read_one(id).await?)
    }

    /// Remove a record and its stored object.
    ///
    /// A missing object is tolerated; a missing record is `NotFound`.
    pub async fn delete(&self, id: &ImageId) -> Result<ImageRecord> {
        let record = self.metadata.delete_one(id).await?;
        self.invalidate().await;

        if !record.file_name.is_empty() {
            if let Err(e) = self.objects.delete(&record.file_name).await {
                tracing::warn!("Deleted {id} but could not remove {}: {e}", record.file_name);
            }
        }
        tracing::debug!("Deleted {id}");
        Ok(record)
    }

    /// Similarity search by hash.
    pub async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<DistanceResult>> {
        self.search.search(query, cancel).await
    }

    /// Similarity search using a stored image as the query.
    pub async fn search_similar_to(
        &self,
        id: &ImageId,
        max_distance: u32,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<DistanceResult>> {
        self.search
            .search_similar_to(id, max_distance, limit, cancel)
            .await
    }

    /// Upload stage: resolve the source, sniff the type and store the object.
    async fn upload(
        &self,
        record: &mut ImageRecord,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let source_ref = record.source_label();
        let from_storage = matches!(record.source, SourceReference::Stored);

        let bytes = if from_storage {
            if record.file_name.is_empty() {
                return Err(MosaicError::Validation(format!(
                    "{} has a stored source but no object key",
                    record.id
                )));
            }
            cancellable(cancel, self.objects.get(&record.file_name)).await??
        } else {
            cancellable(cancel, self.fetcher.fetch(&record.source)).await??
        };

        self.validator.check_size(bytes.len(), &source_ref)?;
        let media_type = self.validator.sniff(&bytes, &source_ref)?;

        // A replacement has to decode before it may displace the stored object
        if !from_storage && !record.file_name.is_empty() {
            cancellable(cancel, self.analyzer.check_decodes(&bytes, &source_ref)).await??;
        }

        let previous_key = std::mem::take(&mut record.file_name);
        record.set_media_type(media_type);

        if !from_storage {
            cancellable(
                cancel,
                self.objects
                    .put(&record.file_name, &bytes, media_type.content_type()),
            )
            .await??;
            // Replacing the source may change the extension
            if !previous_key.is_empty() && previous_key != record.file_name {
                self.objects.delete(&previous_key).await?;
            }
            // Hashes and dimensions described the old bytes
            record.clear_derived();
        }

        record.status = ImageStatus::Uploaded;
        self.commit(record).await?;
        tracing::debug!("Uploaded {} as {}", source_ref, record.file_name);

        Ok(bytes)
    }

    /// Analyze stage: fingerprint the bytes and mark the record COMPLETE.
    async fn analyze_stage(
        &self,
        record: ImageRecord,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ImageRecord> {
        let uploaded_key = record.file_name.clone();
        let mut analyzed = cancellable(cancel, self.analyzer.analyze(bytes, record)).await??;

        if analyzed.file_name != uploaded_key {
            let content_type = analyzed
                .media_type
                .map(|m| m.content_type())
                .unwrap_or("application/octet-stream");
            self.objects
                .put(&analyzed.file_name, bytes, content_type)
                .await?;
            if !uploaded_key.is_empty() {
                self.objects.delete(&uploaded_key).await?;
            }
            tracing::debug!("Moved object {uploaded_key} -> {}", analyzed.file_name);
        }

        if !self.objects.exists(&analyzed.file_name).await? {
            return Err(StoreError::NotFound(analyzed.file_name.clone()).into());
        }

        analyzed.status = ImageStatus::Complete;
        analyzed
            .check_complete()
            .map_err(|reason| MosaicError::IncompleteRecord {
                id: analyzed.id.to_string(),
                reason,
            })?;
        analyzed.source = SourceReference::Stored;

        self.commit(&mut analyzed).await?;
        Ok(analyzed)
    }

    /// Mark `record` as ERROR, persist it, and return `error`.
    async fn fail(&self, mut record: ImageRecord, error: MosaicError) -> Result<ImageRecord> {
        tracing::error!("Ingestion of {} failed: {error}", record.source_label());
        record.status = ImageStatus::Error;
        if let Err(e) = self.commit(&mut record).await {
            tracing::warn!("Could not record failure for {}: {e}", record.id);
        }
        Err(error)
    }

    /// Write a new version of `record` and drop any cached index.
    async fn commit(&self, record: &mut ImageRecord) -> Result<()> {
        record.bump_version();
        self.metadata.write_one(record).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate().await;
        }
    }
}
