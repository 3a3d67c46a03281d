//! Error types for Mosaic.
//!
//! Errors are organized by stage (codec, hash model, analysis pipeline,
//! storage) so callers can tell a missing record apart from a broken one and
//! a bad query apart from a bad catalog entry.

use thiserror::Error;

/// Top-level error type for Mosaic operations.
#[derive(Error, Debug)]
pub enum MosaicError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image analysis pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Perceptual hash parsing errors
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    /// Metadata store / object storage errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Request parameters rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record claimed COMPLETE without the fields that status requires
    #[error("Record {id} cannot be marked complete: {reason}")]
    IncompleteRecord { id: String, reason: String },

    /// The operation was canceled by the caller
    #[error("Operation canceled")]
    Canceled,

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MosaicError {
    /// True when the error means "the record or object does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, MosaicError::Store(StoreError::NotFound(_)))
            || matches!(self, MosaicError::Pipeline(PipelineError::FileNotFound(_)))
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Base-62 decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Nothing to decode
    #[error("empty input")]
    Empty,

    /// A character outside `0-9A-Za-z`
    #[error("invalid digit {digit:?} at position {position}")]
    InvalidDigit { digit: char, position: usize },

    /// The encoded value does not fit in 64 bits
    #[error("value overflows 64 bits")]
    Overflow,
}

/// Perceptual hash errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The text form is not four colon-separated base-62 blocks
    #[error("Malformed perceptual hash {hash:?}: {reason}")]
    Malformed { hash: String, reason: String },
}

/// Image analysis errors, organized by pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bytes could not be decoded as an image
    #[error("Unsupported or corrupt image {source_ref}: {message}")]
    UnsupportedOrCorruptImage { source_ref: String, message: String },

    /// Decoded format is outside GIF/JPEG/PNG/WebP
    #[error("Unsupported media type for {source_ref}: {format}")]
    UnsupportedMediaType { source_ref: String, format: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {source_ref} after {timeout_ms}ms")]
    Timeout {
        source_ref: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Input exceeds size limit
    #[error("File too large: {source_ref} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        source_ref: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {source_ref} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        source_ref: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Source bytes could not be fetched
    #[error("Fetch failed for {source_ref}: {message}")]
    Fetch {
        source_ref: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Local source file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Metadata store and object storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record or object under this key
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend failed for a reason other than absence
    #[error("Backend error: {0}")]
    Backend(String),

    /// Filesystem errors from file-backed stores
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Mosaic results.
pub type Result<T> = std::result::Result<T, MosaicError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for store-specific results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
