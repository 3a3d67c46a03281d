//! Image decoding with format detection, validation, and timeout support.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode an in-memory image on a blocking thread, bounded by the
    /// configured decode timeout.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        source_ref: &str,
    ) -> Result<DecodedImage, PipelineError> {
        let source_owned = source_ref.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &source_owned))
                .await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        source_ref: source_ref.to_string(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                source_ref: source_ref.to_string(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>, source_ref: &str) -> Result<DecodedImage, PipelineError> {
        use std::io::Cursor;

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = reader
            .format()
            .ok_or_else(|| PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: "Cannot detect image format".to_string(),
            })?;
        let image = reader
            .decode()
            .map_err(|e| PipelineError::UnsupportedOrCorruptImage {
                source_ref: source_ref.to_string(),
                message: e.to_string(),
            })?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Ico => "ico".to_string(),
        ImageFormat::Pnm => "pnm".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{encode, textured_image};

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
        assert_eq!(format_to_string(ImageFormat::Bmp), "bmp");
    }

    #[test]
    fn test_format_detected_by_content() {
        let png = encode(&textured_image(1, 40, 30), ImageFormat::Png);
        let result = ImageDecoder::decode_bytes_sync(png, "misnamed.jpg").unwrap();
        assert_eq!(result.format, ImageFormat::Png);
        assert_eq!((result.width, result.height), (40, 30));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_corrupt() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode_from_bytes(b"definitely not an image".to_vec(), "junk")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnsupportedOrCorruptImage { .. }));
    }

    #[tokio::test]
    async fn test_decode_truncated_png_is_corrupt() {
        let mut png = encode(&textured_image(1, 64, 64), ImageFormat::Png);
        png.truncate(png.len() / 2);
        let decoder = ImageDecoder::new(LimitsConfig::default());
        assert!(decoder.decode_from_bytes(png, "truncated").await.is_err());
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_dimensions() {
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);
        let png = encode(&textured_image(1, 64, 16), ImageFormat::Png);
        let err = decoder.decode_from_bytes(png, "wide").await.err().unwrap();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 64,
                height: 16,
                max_dim: 32,
                ..
            }
        ));
    }
}
