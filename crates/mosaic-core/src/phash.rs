//! The 256-bit perceptual hash and its text form.
//!
//! A hash is four independent 64-bit blocks. The text form encodes each block
//! in base-62 and joins them with `:`, e.g. `"3Xk1q9a0:0:LygHa16AHYF:7"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::HashError;

/// Number of 64-bit blocks in a hash.
pub const BLOCKS: usize = 4;

/// Total number of bits, and therefore the largest possible distance.
pub const HASH_BITS: u32 = (BLOCKS as u32) * u64::BITS;

/// Separator between encoded blocks in the text form.
pub const SEPARATOR: char = ':';

/// A 256-bit perceptual hash split into four 64-bit blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PerceptualHash {
    blocks: [u64; BLOCKS],
}

impl PerceptualHash {
    /// Build a hash from its blocks.
    pub const fn from_blocks(blocks: [u64; BLOCKS]) -> Self {
        Self { blocks }
    }

    /// Pack 32 raw hash bytes (big-endian per block) into a hash.
    ///
    /// Returns `None` unless exactly 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != BLOCKS * 8 {
            return None;
        }
        let mut blocks = [0u64; BLOCKS];
        for (block, chunk) in blocks.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *block = u64::from_be_bytes(buf);
        }
        Some(Self { blocks })
    }

    /// The four blocks, most significant first.
    pub fn blocks(&self) -> &[u64; BLOCKS] {
        &self.blocks
    }

    /// Parse the text form. Equivalent to `text.parse()`.
    pub fn parse(text: &str) -> Result<Self, HashError> {
        let segments: Vec<&str> = text.split(SEPARATOR).collect();
        if segments.len() != BLOCKS {
            return Err(HashError::Malformed {
                hash: text.to_string(),
                reason: format!("expected {BLOCKS} segments, found {}", segments.len()),
            });
        }

        let mut blocks = [0u64; BLOCKS];
        for (i, segment) in segments.iter().enumerate() {
            blocks[i] = codec::decode(segment).map_err(|e| HashError::Malformed {
                hash: text.to_string(),
                reason: format!("segment {i}: {e}"),
            })?;
        }

        Ok(Self { blocks })
    }

    /// Hamming distance: the number of differing bits across all blocks.
    ///
    /// Always within `0..=256`.
    pub fn distance(&self, other: &Self) -> u32 {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Distance between two hashes given in text form.
    ///
    /// Fails if either side is malformed; there is no default distance.
    pub fn distance_between(a: &str, b: &str) -> Result<u32, HashError> {
        let a = Self::parse(a)?;
        let b = Self::parse(b)?;
        Ok(a.distance(&b))
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(&codec::encode(*block))?;
        }
        Ok(())
    }
}

impl FromStr for PerceptualHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PerceptualHash> for String {
    fn from(hash: PerceptualHash) -> Self {
        hash.to_string()
    }
}
