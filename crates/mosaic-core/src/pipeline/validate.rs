//! Cheap checks on raw bytes before a full decode.

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::MediaType;

/// Validates raw image bytes against the configured limits.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Reject empty inputs and inputs over `limits.max_file_size_mb`.
    pub fn check_size(&self, len: usize, source_ref: &str) -> PipelineResult<()> {
        if len == 0 {
            return Err(PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: "empty input".to_string(),
            });
        }

        let len = len as u64;
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if len > max_bytes {
            return Err(PipelineError::FileTooLarge {
                source_ref: source_ref.to_string(),
                size_mb: len / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        Ok(())
    }

    /// Identify the media type from the leading magic bytes.
    ///
    /// Recognized image formats outside the accepted set (BMP, TIFF,
    /// HEIC/AVIF) are reported as unsupported media types; anything else is
    /// treated as corrupt.
    pub fn sniff(&self, bytes: &[u8], source_ref: &str) -> PipelineResult<MediaType> {
        if bytes.len() < 4 {
            return Err(PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: "too small to be a valid image".to_string(),
            });
        }

        if let Some(media_type) = Self::media_type_from_header(bytes) {
            return Ok(media_type);
        }

        if let Some(format) = Self::other_image_header(bytes) {
            return Err(PipelineError::UnsupportedMediaType {
                source_ref: source_ref.to_string(),
                format: format.to_string(),
            });
        }

        Err(PipelineError::UnsupportedOrCorruptImage {
            source_ref: source_ref.to_string(),
            message: "unrecognized image format (invalid magic bytes)".to_string(),
        })
    }

    /// Check the header against the accepted formats.
    fn media_type_from_header(header: &[u8]) -> Option<MediaType> {
        // JPEG: FF D8 FF
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaType::Jpeg);
        }

        // PNG: 89 50 4E 47
        if header.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(MediaType::Png);
        }

        // GIF: GIF8
        if header.starts_with(b"GIF8") {
            return Some(MediaType::Gif);
        }

        // WebP: RIFF....WEBP
        if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
            return Some(MediaType::WebP);
        }

        None
    }

    /// Recognize image containers that are valid but not accepted.
    fn other_image_header(header: &[u8]) -> Option<&'static str> {
        if header.starts_with(b"BM") {
            return Some("bmp");
        }

        // TIFF: II (little-endian) or MM (big-endian) followed by version 42
        if header.starts_with(&[b'I', b'I', 0x2A, 0x00])
            || header.starts_with(&[b'M', b'M', 0x00, 0x2A])
        {
            return Some("tiff");
        }

        // HEIC/HEIF/AVIF: ftyp box at offset 4
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            return Some("heif");
        }

        None
    }
}
