//! Mosaic Core - perceptual fingerprinting and near-duplicate image search.
//!
//! Mosaic turns raw image bytes into a durable record carrying a content hash
//! and a 256-bit perceptual hash, and answers "which stored images look like
//! this one?" with a Hamming-distance scan over the catalog.
//!
//! # Architecture
//!
//! ```text
//! Source → Fetch → Sniff → Store object (UPLOADED)
//!        → Decode → Content hash + Perceptual hash (COMPLETE)
//!
//! Query hash → Scan index → Rank (distance, id) → Truncate → Hydrate
//! ```
//!
//! Storage is behind the [`MetadataStore`] and [`ObjectStore`] traits; the
//! crate ships in-memory and filesystem reference backends.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mosaic_core::{
//!     Config, DefaultFetcher, ImageService, MemoryMetadataStore, MemoryObjectStore,
//!     NewImage, SearchQuery, SourceReference,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mosaic_core::Result<()> {
//!     let config = Config::load()?;
//!     let service = ImageService::new(
//!         &config,
//!         Arc::new(MemoryMetadataStore::new()),
//!         Arc::new(MemoryObjectStore::new()),
//!         Arc::new(DefaultFetcher::new(&config.limits)),
//!     );
//!     let cancel = CancellationToken::new();
//!
//!     let source = SourceReference::Local("./photo.jpg".into());
//!     let record = service.create(NewImage::from_source(source), &cancel).await?;
//!
//!     let query = SearchQuery::new(record.perceptual_hash, 10, 10);
//!     for hit in service.search(&query, &cancel).await? {
//!         println!("{} at distance {}", hit.id, hit.distance);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod phash;
pub mod pipeline;
pub mod search;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    CodecError, ConfigError, HashError, MosaicError, PipelineError, PipelineResult, Result,
    StoreError, StoreResult,
};
pub use phash::PerceptualHash;
pub use pipeline::{Analyzer, DefaultFetcher, FileDiscovery, Hasher, SourceFetcher};
pub use search::{IndexCache, SearchQuery, SimilaritySearch};
pub use service::ImageService;
pub use store::{
    FsObjectStore, MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore,
    PERCEPTUAL_HASH_INDEX,
};
pub use types::{
    DistanceResult, FingerprintEntry, ImageId, ImageRecord, ImageStatus, ImageUpdate, MediaType,
    NewImage, SourceReference,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
