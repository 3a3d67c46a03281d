//! Interfaces to the metadata store and object storage.
//!
//! The core depends only on these traits. `memory` and `fs` hold reference
//! backends used by the CLI and by tests.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::{MemoryMetadataStore, MemoryObjectStore};

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{FingerprintEntry, ImageId, ImageRecord};

/// Name of the secondary index holding `(id, perceptual hash)` pairs.
pub const PERCEPTUAL_HASH_INDEX: &str = "perceptual_hash";

/// The versioned record store that owns image records.
///
/// Uses `async_trait` because the service and search components hold it as
/// `Arc<dyn MetadataStore>`.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Full scan of a secondary index.
    async fn read_all(&self, index: &str) -> StoreResult<Vec<FingerprintEntry>>;

    /// Read one record; `StoreError::NotFound` if absent.
    async fn read_one(&self, id: &ImageId) -> StoreResult<ImageRecord>;

    /// Insert or replace a record. The store keeps its indexes in step.
    async fn write_one(&self, record: &ImageRecord) -> StoreResult<()>;

    /// Remove and return a record; `StoreError::NotFound` if absent.
    async fn delete_one(&self, id: &ImageId) -> StoreResult<ImageRecord>;
}

/// Blob storage for raw image bytes, keyed by file name.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Read an object; `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Write (or overwrite) an object.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StoreResult<()>;

    /// Remove an object. Removing a missing object succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
