//! Handler configuration via `huebucket.toml`
//!
//! A single file holds collection names, the hue field, deduplication,
//! retry backoff, and logging. Every field has a default, so an empty file
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::transactions::RetryConfig;
use crate::telemetry::LogFormat;
use huebucket_core::{CollectionName, HueError, HueResult, HUE_FIELD};

/// Config file name looked up by hosts.
pub const CONFIG_FILE_NAME: &str = "huebucket.toml";

/// Default collection holding one counter document per hue.
pub const DEFAULT_BUCKETS_COLLECTION: &str = "bucket-counts";

/// Default collection holding processed-document markers.
pub const DEFAULT_PROCESSED_COLLECTION: &str = "processed-results";

/// Logging section of `huebucket.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub filter: String,
    /// `"text"` or `"json"`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parse the format string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"text"` or `"json"`.
    pub fn log_format(&self) -> HueResult<LogFormat> {
        self.format
            .parse()
            .map_err(|e: String| HueError::invalid_input(format!("{} in {}", e, CONFIG_FILE_NAME)))
    }
}

/// Handler configuration loaded from `huebucket.toml`.
///
/// # Example
///
/// ```toml
/// buckets_collection = "bucket-counts"
/// processed_collection = "processed-results"
/// hue_field = "threshold_hue"
/// deduplicate = true
///
/// [retry]
/// max_retries = 4
/// base_delay_ms = 10
/// max_delay_ms = 200
/// jitter = true
///
/// [logging]
/// filter = "info"
/// format = "text"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HueBucketConfig {
    /// Collection holding one counter document per hue.
    pub buckets_collection: String,
    /// Collection holding processed-document markers.
    pub processed_collection: String,
    /// Name of the hue field in created result documents.
    pub hue_field: String,
    /// Count each source document at most once.
    pub deduplicate: bool,
    /// Retry backoff for transient store failures.
    pub retry: RetryConfig,
    /// Log sink settings.
    pub logging: LoggingConfig,
}

impl Default for HueBucketConfig {
    fn default() -> Self {
        Self {
            buckets_collection: DEFAULT_BUCKETS_COLLECTION.to_string(),
            processed_collection: DEFAULT_PROCESSED_COLLECTION.to_string(),
            hue_field: HUE_FIELD.to_string(),
            deduplicate: true,
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HueBucketConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# huebucket configuration
#
# Collection holding one counter document per distinct hue value.
buckets_collection = "bucket-counts"

# Collection holding one marker per counted result document.
processed_collection = "processed-results"

# Numeric field read from each created result document.
hue_field = "threshold_hue"

# Count each result document at most once, even if its creation event is
# delivered twice (default: true).
deduplicate = true

# Retry policy for commit conflicts and store outages.
# Delay before retry n is min(base_delay_ms * 2^n, max_delay_ms);
# with jitter the actual sleep is uniform in [0, delay].
[retry]
max_retries = 4
base_delay_ms = 10
max_delay_ms = 200
jitter = true

# Logging. RUST_LOG overrides `filter` when set.
# format: "text" (default) or "json"
[logging]
filter = "info"
format = "text"
"#
    }

    /// Parse and validate config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not parse or fails [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> HueResult<Self> {
        let config: HueBucketConfig = toml::from_str(content).map_err(|e| {
            HueError::invalid_input(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> HueResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HueError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> HueResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                HueError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> HueResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HueError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            HueError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Check every field for values the handler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the first offending field.
    pub fn validate(&self) -> HueResult<()> {
        self.buckets_collection()?;
        self.processed_collection()?;
        if self.buckets_collection == self.processed_collection {
            return Err(HueError::invalid_input(format!(
                "buckets_collection and processed_collection must differ (both '{}')",
                self.buckets_collection
            )));
        }
        if self.hue_field.is_empty() {
            return Err(HueError::invalid_input("hue_field must not be empty"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(HueError::invalid_input(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        self.logging.log_format()?;
        Ok(())
    }

    /// Validated bucket collection name.
    pub fn buckets_collection(&self) -> HueResult<CollectionName> {
        CollectionName::new(self.buckets_collection.as_str())
    }

    /// Validated marker collection name.
    pub fn processed_collection(&self) -> HueResult<CollectionName> {
        CollectionName::new(self.processed_collection.as_str())
    }
}
