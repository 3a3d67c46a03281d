//! A short-lived snapshot of the fingerprint index.
//!
//! The cache is an explicit object shared by handle. Whoever writes records
//! calls [`IndexCache::invalidate`]; readers within the TTL reuse the last
//! full scan.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::store::{MetadataStore, PERCEPTUAL_HASH_INDEX};
use crate::types::FingerprintEntry;

type Snapshot = (Instant, Arc<Vec<FingerprintEntry>>);

/// Caches the result of a full fingerprint index scan.
pub struct IndexCache {
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl IndexCache {
    /// Create a cache whose snapshots expire after `ttl`.
    ///
    /// A zero TTL disables caching: every call performs a fresh scan.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Return the cached index, scanning `store` when it is stale or absent.
    pub async fn get_or_load(
        &self,
        store: &dyn MetadataStore,
    ) -> StoreResult<Arc<Vec<FingerprintEntry>>> {
        if self.ttl.is_zero() {
            return Ok(Arc::new(store.read_all(PERCEPTUAL_HASH_INDEX).await?));
        }

        if let Some((loaded_at, entries)) = self.snapshot.read().await.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(entries));
            }
        }

        let mut snapshot = self.snapshot.write().await;
        // Another reader may have refreshed while we waited for the lock
        if let Some((loaded_at, entries)) = snapshot.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(entries));
            }
        }

        let entries = Arc::new(store.read_all(PERCEPTUAL_HASH_INDEX).await?);
        tracing::debug!("Index cache refreshed ({} entries)", entries.len());
        *snapshot = Some((Instant::now(), Arc::clone(&entries)));
        Ok(entries)
    }

    /// Drop the cached snapshot so the next read rescans.
    pub async fn invalidate(&self) {
        self.snapshot.write().await.take();
    }
}
