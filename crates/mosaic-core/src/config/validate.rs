//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::phash::HASH_BITS;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.search.max_limit == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_limit must be > 0".into(),
            ));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(ConfigError::ValidationError(
                "search.default_limit must be between 1 and search.max_limit".into(),
            ));
        }
        if self.search.default_max_distance > HASH_BITS {
            return Err(ConfigError::ValidationError(format!(
                "search.default_max_distance must be <= {HASH_BITS}"
            )));
        }
        if self.hydration.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "hydration.batch_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}
