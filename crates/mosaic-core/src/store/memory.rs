//! In-memory backends, with optional JSON snapshot persistence for records.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::types::{FingerprintEntry, ImageId, ImageRecord};

use super::{MetadataStore, ObjectStore, PERCEPTUAL_HASH_INDEX};

/// Record store held in memory.
///
/// When opened from a path, every write rewrites the snapshot file so the
/// catalog survives restarts. The fingerprint index is derived from the
/// records on read and therefore always tracks them 1:1.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: RwLock<BTreeMap<ImageId, ImageRecord>>,
    snapshot: Option<PathBuf>,
}

impl MemoryMetadataStore {
    /// An empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot file, loading it if present.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let records = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let list: Vec<ImageRecord> = serde_json::from_slice(&bytes)?;
                list.into_iter().map(|r| (r.id, r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Opened catalog {:?} with {} record(s)", path, records.len());

        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(path.to_path_buf()),
        })
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Flush the current records to the snapshot file.
    ///
    /// Writes already persist; this is for callers that want an explicit
    /// checkpoint (e.g. after opening an old catalog).
    pub async fn save(&self) -> StoreResult<()> {
        let records = self.records.read().await;
        self.persist(&records).await
    }

    /// Write the snapshot file (no-op for purely in-memory stores).
    async fn persist(&self, records: &BTreeMap<ImageId, ImageRecord>) -> StoreResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let list: Vec<&ImageRecord> = records.values().collect();
        let json = serde_json::to_vec_pretty(&list)?;

        // Write-then-rename so a crash never leaves a half-written catalog
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn read_all(&self, index: &str) -> StoreResult<Vec<FingerprintEntry>> {
        if index != PERCEPTUAL_HASH_INDEX {
            return Err(StoreError::Backend(format!("unknown index: {index}")));
        }
        let records = self.records.read().await;
        Ok(records.values().filter_map(ImageRecord::fingerprint).collect())
    }

    async fn read_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn write_one(&self, record: &ImageRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let previous = records.insert(record.id, record.clone());

        // Memory must not run ahead of the snapshot
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(previous) => records.insert(record.id, previous),
                None => records.remove(&record.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_one(&self, id: &ImageId) -> StoreResult<ImageRecord> {
        let mut records = self.records.write().await;
        let removed = records
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Err(e) = self.persist(&records).await {
            records.insert(removed.id, removed);
            return Err(e);
        }
        Ok(removed)
    }
}

/// Object storage held in memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for `key`, if the object exists.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().await.get(key).map(|(_, ct)| ct.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// True when no objects are stored.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
