//! Image analysis pipeline components.
//!
//! - **validate**: Size limits and magic-byte sniffing on raw bytes
//! - **decode**: Decode images with format detection and a timeout
//! - **hash**: Content (BLAKE3) and perceptual (DCT) hashing
//! - **analyzer**: Orchestrates the stages into a fingerprinted record
//! - **fetch**: Resolve a source reference to raw bytes
//! - **discovery**: Find image files in local directories

pub mod analyzer;
pub mod decode;
pub mod discovery;
pub mod fetch;
pub mod hash;
pub mod validate;

// Re-exports for convenient access
pub use analyzer::Analyzer;
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use fetch::{DefaultFetcher, SourceFetcher};
pub use hash::Hasher;
pub use validate::Validator;
