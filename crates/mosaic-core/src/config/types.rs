//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for the catalog and stored objects
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.mosaic"),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Remote source fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            fetch_timeout_ms: 30000,
        }
    }
}

/// Similarity search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest accepted result limit; bounds downstream hydration
    pub max_limit: usize,

    /// Limit used when the caller does not give one
    pub default_limit: usize,

    /// Max distance used when the caller does not give one
    pub default_max_distance: u32,

    /// How long a fingerprint index snapshot may be reused (0 = always rescan)
    pub index_cache_ttl_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_limit: 100,
            default_limit: 10,
            default_max_distance: 10,
            index_cache_ttl_ms: 0,
        }
    }
}

/// Record hydration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    /// Maximum concurrent record fetches per batch
    pub batch_size: usize,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

/// Reference storage backends used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Catalog snapshot file, relative to `general.data_dir` unless absolute
    pub catalog_file: PathBuf,

    /// Object directory, relative to `general.data_dir` unless absolute
    pub objects_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_file: PathBuf::from("catalog.json"),
            objects_dir: PathBuf::from("objects"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
