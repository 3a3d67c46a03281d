//! Linear-scan similarity search over the fingerprint index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{MosaicError, Result};
use crate::phash::{PerceptualHash, HASH_BITS};
use crate::store::{MetadataStore, PERCEPTUAL_HASH_INDEX};
use crate::types::{DistanceResult, FingerprintEntry, ImageId};

use super::cache::IndexCache;
use super::hydrate::Hydrator;

/// A similarity query: every image within `max_distance` bits of `hash`,
/// nearest first, at most `limit` of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub hash: String,
    pub max_distance: u32,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(hash: impl Into<String>, max_distance: u32, limit: usize) -> Self {
        Self {
            hash: hash.into(),
            max_distance,
            limit,
        }
    }
}

/// Rank index entries by distance from `query`.
///
/// Entries whose hash does not parse are logged and skipped, entries farther
/// than `max_distance` are dropped, and the rest are sorted by distance then
/// id. The result is not truncated.
pub fn rank(
    query: &PerceptualHash,
    entries: &[FingerprintEntry],
    max_distance: u32,
) -> Vec<(ImageId, u32)> {
    let mut skipped = 0usize;
    let mut ranked: Vec<(ImageId, u32)> = entries
        .iter()
        .filter_map(|entry| match PerceptualHash::parse(&entry.perceptual_hash) {
            Ok(candidate) => Some((entry.id, query.distance(&candidate))),
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping index entry {}: {e}", entry.id);
                None
            }
        })
        .filter(|&(_, distance)| distance <= max_distance)
        .collect();

    ranked.sort_unstable_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    if skipped > 0 {
        tracing::debug!("Ranked {} candidate(s), skipped {skipped}", ranked.len());
    }
    ranked
}

/// Near-duplicate search against a metadata store.
pub struct SimilaritySearch {
    store: Arc<dyn MetadataStore>,
    hydrator: Hydrator,
    cache: Option<Arc<IndexCache>>,
    max_limit: usize,
}

impl SimilaritySearch {
    pub fn new(store: Arc<dyn MetadataStore>, config: &Config) -> Self {
        Self {
            hydrator: Hydrator::new(Arc::clone(&store), &config.hydration),
            store,
            cache: None,
            max_limit: config.search.max_limit,
        }
    }

    /// Serve index reads through `cache`.
    pub fn with_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check a query without touching the store, returning the parsed hash.
    pub fn validate(&self, query: &SearchQuery) -> Result<PerceptualHash> {
        if query.hash.trim().is_empty() {
            return Err(MosaicError::Validation("query hash is empty".into()));
        }
        let hash = PerceptualHash::parse(&query.hash)?;

        if query.max_distance > HASH_BITS {
            return Err(MosaicError::Validation(format!(
                "max_distance must be between 0 and {HASH_BITS}, got {}",
                query.max_distance
            )));
        }
        if query.limit == 0 || query.limit > self.max_limit {
            return Err(MosaicError::Validation(format!(
                "limit must be between 1 and {}, got {}",
                self.max_limit, query.limit
            )));
        }
        Ok(hash)
    }

    /// Find images whose hash is within `query.max_distance` of `query.hash`.
    ///
    /// Results are ordered by distance then id, and hydrated with their
    /// full records. Hits whose record cannot be read are omitted, so the
    /// result may be shorter than the number of matches.
    pub async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<DistanceResult>> {
        let hash = self.validate(query)?;

        let entries = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MosaicError::Canceled),
            entries = self.load_index() => entries?,
        };

        let mut ranked = rank(&hash, &entries, query.max_distance);
        let matched = ranked.len();
        ranked.truncate(query.limit);

        let ids: Vec<ImageId> = ranked.iter().map(|&(id, _)| id).collect();
        let mut records = self.hydrator.hydrate(&ids, cancel).await?;

        let results: Vec<DistanceResult> = ranked
            .into_iter()
            .filter_map(|(id, distance)| {
                records.remove(&id).map(|image| DistanceResult {
                    id,
                    image: Some(image),
                    distance,
                })
            })
            .collect();

        tracing::debug!(
            "Search scanned {} entries, {} within distance {}, returning {}",
            entries.len(),
            matched,
            query.max_distance,
            results.len()
        );
        Ok(results)
    }

    /// Search using the stored perceptual hash of an existing image.
    pub async fn search_similar_to(
        &self,
        id: &ImageId,
        max_distance: u32,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<DistanceResult>> {
        let record = self.store.read_one(id).await?;
        if record.perceptual_hash.is_empty() {
            return Err(MosaicError::Validation(format!(
                "image {id} has not been analyzed"
            )));
        }
        let query = SearchQuery::new(record.perceptual_hash, max_distance, limit);
        self.search(&query, cancel).await
    }

    async fn load_index(&self) -> Result<Arc<Vec<FingerprintEntry>>> {
        let entries = match &self.cache {
            Some(cache) => cache.get_or_load(self.store.as_ref()).await?,
            None => Arc::new(self.store.read_all(PERCEPTUAL_HASH_INDEX).await?),
        };
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HashError, StoreError, StoreResult};
    use crate::store::MemoryMetadataStore;
    use crate::types::{ImageRecord, SourceReference};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const QUERY: PerceptualHash = PerceptualHash::from_blocks([0; 4]);

    /// A hash `bits` away from the all-zero query.
    fn hash_at(bits: u32) -> String {
        let mut blocks = [0u64; 4];
        for bit in 0..bits {
            blocks[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        PerceptualHash::from_blocks(blocks).to_string()
    }

    fn record_at(bits: u32) -> ImageRecord {
        let mut record = ImageRecord::new(SourceReference::Stored);
        record.perceptual_hash = hash_at(bits);
        record
    }

    /// Wraps a memory store, counting index scans and hiding some records
    /// from point reads.
    #[derive(Default)]
    struct ProbeStore {
        inner: MemoryMetadataStore,
        hidden: HashSet<ImageId>,
        scans: AtomicUsize,
        scan_delay: Option<Duration>,
    }

    #[async_trait]
    impl MetadataStore for ProbeStore {
        async fn read_all(&self, index: &str) -> StoreResult<Vec<FingerprintEntry>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.scan_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.read_all(index).await
        }

        async fn read_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
            if self.hidden.contains(id) {
                return Err(StoreError::NotFound(id.to_string()));
            }
            self.inner.read_one(id).await
        }

        async fn write_one(&self, record: &ImageRecord) -> StoreResult<()> {
            self.inner.write_one(record).await
        }

        async fn delete_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
            self.inner.delete_one(id).await
        }
    }

    async fn probe_with(distances: &[u32]) -> (Arc<ProbeStore>, Vec<ImageId>) {
        let store = ProbeStore::default();
        let mut ids = Vec::new();
        for &d in distances {
            let record = record_at(d);
            ids.push(record.id);
            store.write_one(&record).await.unwrap();
        }
        (Arc::new(store), ids)
    }

    fn search_over(store: Arc<ProbeStore>) -> SimilaritySearch {
        SimilaritySearch::new(store, &Config::default())
    }

    fn query(max_distance: u32, limit: usize) -> SearchQuery {
        SearchQuery::new(QUERY.to_string(), max_distance, limit)
    }

    #[test]
    fn test_rank_orders_by_distance_then_id() {
        let a = ImageId::generate();
        let b = ImageId::generate();
        let c = ImageId::generate();
        let entries = vec![
            FingerprintEntry { id: c, perceptual_hash: hash_at(3) },
            FingerprintEntry { id: b, perceptual_hash: hash_at(1) },
            FingerprintEntry { id: a, perceptual_hash: hash_at(1) },
        ];

        let ranked = rank(&QUERY, &entries, 256);
        let mut ties = [a, b];
        ties.sort();
        assert_eq!(ranked, vec![(ties[0], 1), (ties[1], 1), (c, 3)]);
    }

    #[test]
    fn test_rank_skips_corrupt_entries() {
        let good = ImageId::generate();
        let entries = vec![
            FingerprintEntry { id: ImageId::generate(), perceptual_hash: "not-a-hash".into() },
            FingerprintEntry { id: ImageId::generate(), perceptual_hash: "1:2:3".into() },
            FingerprintEntry { id: good, perceptual_hash: hash_at(2) },
        ];
        assert_eq!(rank(&QUERY, &entries, 256), vec![(good, 2)]);
    }

    #[test]
    fn test_rank_filter_is_monotonic() {
        let entries: Vec<FingerprintEntry> = [0, 4, 8, 12, 40, 200]
            .iter()
            .map(|&d| FingerprintEntry {
                id: ImageId::generate(),
                perceptual_hash: hash_at(d),
            })
            .collect();

        let mut previous = 0;
        for max in [0, 4, 10, 12, 64, 256] {
            let ranked = rank(&QUERY, &entries, max);
            assert!(ranked.iter().all(|&(_, d)| d <= max));
            assert!(ranked.len() >= previous);
            previous = ranked.len();
        }
        assert_eq!(previous, entries.len());
    }

    #[tokio::test]
    async fn test_search_returns_ranked_hydrated_results() {
        let (store, ids) = probe_with(&[5, 0, 43, 2]).await;
        let search = search_over(store);

        let results = search
            .search(&query(10, 10), &CancellationToken::new())
            .await
            .unwrap();

        let distances: Vec<u32> = results.iter().map(|r| r.distance).collect();
        assert_eq!(distances, vec![0, 2, 5]);
        assert_eq!(results[0].id, ids[1]);
        for result in &results {
            assert_eq!(result.image.as_ref().unwrap().id, result.id);
        }
    }

    #[tokio::test]
    async fn test_search_is_deterministic() {
        let (store, _) = probe_with(&[3, 3, 3, 1, 7, 1, 0]).await;
        let search = search_over(store);
        let cancel = CancellationToken::new();

        let first = search.search(&query(256, 100), &cancel).await.unwrap();
        let second = search.search(&query(256, 100), &cancel).await.unwrap();
        let first: Vec<_> = first.iter().map(|r| (r.id, r.distance)).collect();
        let second: Vec<_> = second.iter().map(|r| (r.id, r.distance)).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[tokio::test]
    async fn test_limit_truncates_after_ranking() {
        let (store, ids) = probe_with(&[9, 1, 4, 0, 6]).await;
        let search = search_over(store);

        let results = search
            .search(&query(256, 2), &CancellationToken::new())
            .await
            .unwrap();
        let got: Vec<ImageId> = results.iter().map(|r| r.id).collect();
        assert_eq!(got, vec![ids[3], ids[1]]);
    }

    #[tokio::test]
    async fn test_self_match_comes_first() {
        let (store, ids) = probe_with(&[1, 0]).await;
        let search = search_over(store);

        let results = search
            .search_similar_to(&ids[1], 5, 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results[0].id, ids[1]);
        assert_eq!(results[0].distance, 0);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_similar_to_unknown_id_is_not_found() {
        let (store, _) = probe_with(&[0]).await;
        let search = search_over(store);
        let err = search
            .search_similar_to(&ImageId::generate(), 5, 10, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let (store, _) = probe_with(&[]).await;
        let search = search_over(store);
        let results = search
            .search(&query(256, 100), &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_index_entry_is_skipped() {
        let (store, ids) = probe_with(&[1, 2]).await;
        let mut broken = ImageRecord::new(SourceReference::Stored);
        broken.perceptual_hash = "1:2:3".into();
        store.write_one(&broken).await.unwrap();
        let search = search_over(store);

        let results = search
            .search(&query(256, 100), &CancellationToken::new())
            .await
            .unwrap();
        let got: Vec<ImageId> = results.iter().map(|r| r.id).collect();
        assert_eq!(got, vec![ids[0], ids[1]]);
    }

    #[tokio::test]
    async fn test_hydration_miss_is_omitted() {
        let mut store = ProbeStore::default();
        let mut ids = Vec::new();
        for d in [0, 1, 2] {
            let record = record_at(d);
            ids.push(record.id);
            store.write_one(&record).await.unwrap();
        }
        store.hidden.insert(ids[1]);
        let search = search_over(Arc::new(store));

        let results = search
            .search(&query(10, 10), &CancellationToken::new())
            .await
            .unwrap();
        let got: Vec<(ImageId, u32)> = results.iter().map(|r| (r.id, r.distance)).collect();
        assert_eq!(got, vec![(ids[0], 0), (ids[2], 2)]);
    }

    #[tokio::test]
    async fn test_invalid_queries_rejected_before_io() {
        let (store, _) = probe_with(&[0]).await;
        let search = search_over(store.clone());
        let cancel = CancellationToken::new();

        for bad in [
            SearchQuery::new("", 10, 10),
            SearchQuery::new("   ", 10, 10),
            query(257, 10),
            query(10, 0),
            query(10, 101),
        ] {
            let err = search.search(&bad, &cancel).await.unwrap_err();
            assert!(matches!(err, MosaicError::Validation(_)), "{bad:?}: {err}");
        }

        let err = search
            .search(&SearchQuery::new("1:2:3", 10, 10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::Hash(HashError::Malformed { .. })));

        assert_eq!(store.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boundary_parameters_accepted() {
        let (store, _) = probe_with(&[256]).await;
        let search = search_over(store);
        let cancel = CancellationToken::new();

        let results = search.search(&query(256, 100), &cancel).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance, 256);

        let results = search.search(&query(0, 1), &cancel).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_index_read() {
        let mut store = ProbeStore::default();
        store.write_one(&record_at(0)).await.unwrap();
        store.scan_delay = Some(Duration::from_millis(500));
        let search = search_over(Arc::new(store));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = search.search(&query(10, 10), &cancel).await.unwrap_err();
        assert!(matches!(err, MosaicError::Canceled));
    }

    #[tokio::test]
    async fn test_cached_index_skips_rescans() {
        let (store, _) = probe_with(&[0, 1]).await;
        let cache = Arc::new(IndexCache::new(Duration::from_secs(60)));
        let search = search_over(store.clone()).with_cache(cache.clone());
        let cancel = CancellationToken::new();

        search.search(&query(10, 10), &cancel).await.unwrap();
        search.search(&query(10, 10), &cancel).await.unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        search.search(&query(10, 10), &cancel).await.unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 2);
    }
}
