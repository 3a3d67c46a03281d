//! The analysis pipeline: raw bytes in, fingerprinted record out.

use std::time::Instant;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ImageRecord, MediaType};

use super::decode::{format_to_string, ImageDecoder};
use super::hash::Hasher;
use super::validate::Validator;

/// Turns raw image bytes into a fully populated [`ImageRecord`].
///
/// The analyzer has no side effects: persisting the record and uploading the
/// bytes are the caller's job.
pub struct Analyzer {
    decoder: ImageDecoder,
    validator: Validator,
    hasher: Hasher,
}

impl Analyzer {
    /// Create a new analyzer with the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            decoder: ImageDecoder::new(config.limits.clone()),
            validator: Validator::new(config.limits.clone()),
            hasher: Hasher::new(),
        }
    }

    /// Decode `bytes` and discard the result.
    ///
    /// Vets a replacement before it is allowed to overwrite a stored object.
    pub async fn check_decodes(&self, bytes: &[u8], source_ref: &str) -> PipelineResult<()> {
        self.decoder
            .decode_from_bytes(bytes.to_vec(), source_ref)
            .await
            .map(|_| ())
    }

    /// Analyze `bytes` and fill in the derived fields of `record`.
    ///
    /// Stages run in a fixed order and the first failure aborts the rest:
    /// decode, media type, file name, file size, content hash, perceptual
    /// hash, dimensions. Status is left for the caller to set.
    pub async fn analyze(&self, bytes: &[u8], mut record: ImageRecord) -> PipelineResult<ImageRecord> {
        let start = Instant::now();
        let source_ref = record.source_label();
        tracing::debug!("Analyzing: {source_ref}");

        self.validator.check_size(bytes.len(), &source_ref)?;

        // Decode
        let decode_start = Instant::now();
        let decoded = self
            .decoder
            .decode_from_bytes(bytes.to_vec(), &source_ref)
            .await?;
        tracing::trace!("  Decode: {:?}", decode_start.elapsed());

        // Media type and file name
        let media_type = MediaType::from_format(decoded.format).ok_or_else(|| {
            PipelineError::UnsupportedMediaType {
                source_ref: source_ref.clone(),
                format: format_to_string(decoded.format),
            }
        })?;
        record.set_media_type(media_type);

        record.file_size = bytes.len() as u64;

        // Content hash
        let hash_start = Instant::now();
        record.content_hash = Hasher::content_hash_from_bytes(bytes);
        tracing::trace!("  Content hash: {:?}", hash_start.elapsed());

        // Perceptual hash
        let phash_start = Instant::now();
        let perceptual_hash = self.hasher.perceptual_hash(&decoded.image).ok_or_else(|| {
            PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.clone(),
                message: "perceptual hash has unexpected width".to_string(),
            }
        })?;
        record.perceptual_hash = perceptual_hash.to_string();
        tracing::trace!("  Perceptual hash: {:?}", phash_start.elapsed());

        // Dimensions; a decoded image always has non-zero bounds
        record.width = decoded.width;
        record.height = decoded.height;
        record.aspect_ratio = f64::from(decoded.width) / f64::from(decoded.height);

        tracing::debug!(
            "Analyzed {} in {:?} ({}x{}, {})",
            record.file_name,
            start.elapsed(),
            record.width,
            record.height,
            media_type
        );

        Ok(record)
    }
}
