//! Bounded-concurrency hydration of search hits into full records.
//!
//! Ids are fetched in fixed-size batches. Each batch spawns one task per id
//! and must finish before the next batch starts, so at most `batch_size`
//! reads are ever in flight against the metadata store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::HydrationConfig;
use crate::error::{MosaicError, Result, StoreError};
use crate::store::MetadataStore;
use crate::types::{ImageId, ImageRecord};

/// Fetches full records for a list of ids, best-effort.
pub struct Hydrator {
    store: Arc<dyn MetadataStore>,
    batch_size: usize,
}

impl Hydrator {
    /// Create a hydrator reading from `store`.
    pub fn new(store: Arc<dyn MetadataStore>, config: &HydrationConfig) -> Self {
        Self {
            store,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Maximum number of concurrent reads.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch the records for `ids`.
    ///
    /// Ids whose read fails (missing record, backend error, panicked task)
    /// are simply absent from the returned map. Cancellation aborts the
    /// batch in flight and returns [`MosaicError::Canceled`] rather than a
    /// partial map.
    pub async fn hydrate(
        &self,
        ids: &[ImageId],
        cancel: &CancellationToken,
    ) -> Result<HashMap<ImageId, ImageRecord>> {
        let mut records = HashMap::with_capacity(ids.len());

        for (batch_index, batch) in ids.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(MosaicError::Canceled);
            }
            tracing::trace!("Hydrating batch {} ({} ids)", batch_index, batch.len());

            let mut tasks = JoinSet::new();
            for &id in batch {
                let store = Arc::clone(&self.store);
                tasks.spawn(async move { (id, store.read_one(&id).await) });
            }

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tasks.abort_all();
                        tracing::debug!("Hydration canceled during batch {batch_index}");
                        return Err(MosaicError::Canceled);
                    }
                    joined = tasks.join_next() => match joined {
                        None => break,
                        Some(Ok((id, Ok(record)))) => {
                            records.insert(id, record);
                        }
                        Some(Ok((id, Err(StoreError::NotFound(_))))) => {
                            tracing::debug!("Hydration miss for {id}: record not found");
                        }
                        Some(Ok((id, Err(e)))) => {
                            tracing::warn!("Hydration failed for {id}: {e}");
                        }
                        Some(Err(e)) => {
                            tracing::error!("Hydration task panicked: {e}");
                        }
                    },
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::types::{FingerprintEntry, SourceReference};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// A store whose reads are slow and observable.
    ///
    /// Tracks in-flight reads (and the peak), and can be told to miss or fail
    /// specific ids.
    #[derive(Default)]
    struct MockStore {
        records: HashMap<ImageId, ImageRecord>,
        failing: HashSet<ImageId>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockStore {
        fn with_records(n: usize) -> (Self, Vec<ImageId>) {
            let mut records = HashMap::new();
            let mut ids = Vec::new();
            for _ in 0..n {
                let record = ImageRecord::new(SourceReference::Stored);
                ids.push(record.id);
                records.insert(record.id, record);
            }
            (
                Self {
                    records,
                    ..Self::default()
                },
                ids,
            )
        }
    }

    #[async_trait]
    impl MetadataStore for MockStore {
        async fn read_all(&self, _index: &str) -> StoreResult<Vec<FingerprintEntry>> {
            Ok(vec![])
        }

        async fn read_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(id) {
                return Err(StoreError::Backend("simulated outage".into()));
            }
            self.records
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        }

        async fn write_one(&self, _record: &ImageRecord) -> StoreResult<()> {
            Ok(())
        }

        async fn delete_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    fn config(batch_size: usize) -> HydrationConfig {
        HydrationConfig { batch_size }
    }

    #[tokio::test]
    async fn test_hydrates_all_records() {
        let (store, ids) = MockStore::with_records(25);
        let hydrator = Hydrator::new(Arc::new(store), &config(10));

        let records = hydrator
            .hydrate(&ids, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 25);
        for id in &ids {
            assert_eq!(records[id].id, *id);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_reads_bounded_by_batch_size() {
        let (mut store, ids) = MockStore::with_records(35);
        store.delay = Some(Duration::from_millis(20));
        let store = Arc::new(store);
        let hydrator = Hydrator::new(store.clone(), &config(10));

        let records = hydrator
            .hydrate(&ids, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 35);
        assert_eq!(store.calls.load(Ordering::SeqCst), 35);
        let peak = store.peak.load(Ordering::SeqCst);
        assert!(peak <= 10, "peak in-flight reads was {peak}");
        assert!(peak > 1, "reads within a batch should overlap");
    }

    #[tokio::test]
    async fn test_misses_and_failures_are_dropped() {
        let (mut store, mut ids) = MockStore::with_records(5);
        store.failing.insert(ids[1]);
        let ghost = ImageId::generate();
        ids.push(ghost);
        let failing = ids[1];
        let hydrator = Hydrator::new(Arc::new(store), &config(2));

        let records = hydrator
            .hydrate(&ids, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 4);
        assert!(!records.contains_key(&failing));
        assert!(!records.contains_key(&ghost));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (store, _) = MockStore::with_records(0);
        let hydrator = Hydrator::new(Arc::new(store), &config(10));
        let records = hydrator
            .hydrate(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (store, ids) = MockStore::with_records(3);
        let store = Arc::new(store);
        let hydrator = Hydrator::new(store.clone(), &config(10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = hydrator.hydrate(&ids, &cancel).await.unwrap_err();
        assert!(matches!(err, MosaicError::Canceled));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_is_not_a_partial_result() {
        let (mut store, ids) = MockStore::with_records(30);
        store.delay = Some(Duration::from_millis(200));
        let hydrator = Hydrator::new(Arc::new(store), &config(10));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = hydrator.hydrate(&ids, &cancel).await.unwrap_err();
        assert!(matches!(err, MosaicError::Canceled));
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let (store, _) = MockStore::with_records(0);
        let hydrator = Hydrator::new(Arc::new(store), &config(0));
        assert_eq!(hydrator.batch_size(), 1);
    }
}
