//! Content and perceptual hashing.

use blake3::Hasher as Blake3Hasher;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

use crate::phash::PerceptualHash;

/// Side length of the DCT window; 16x16 bits make the 256-bit hash.
pub const HASH_WINDOW: u32 = 16;

/// Provides content hashing and perceptual hashing for images.
///
/// The perceptual hasher is pre-configured once and reused for every image.
pub struct Hasher {
    phash_hasher: image_hasher::Hasher,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a new hasher using DCT preprocessing and median thresholding.
    pub fn new() -> Self {
        let phash_hasher = HasherConfig::new()
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .hash_size(HASH_WINDOW, HASH_WINDOW)
            .to_hasher();
        Self { phash_hasher }
    }

    /// BLAKE3 hex digest of raw bytes, for exact-duplicate and integrity checks.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }

    /// Perceptual hash of a decoded image.
    ///
    /// Visually similar images produce hashes with a small Hamming distance,
    /// regardless of container format or compression. Returns `None` if the
    /// hasher produced anything other than 256 bits.
    pub fn perceptual_hash(&self, image: &DynamicImage) -> Option<PerceptualHash> {
        let hash = self.phash_hasher.hash_image(image);
        PerceptualHash::from_bytes(hash.as_bytes())
    }
}
