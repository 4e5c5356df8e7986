//! Configuration types for japdl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the acquisition pipeline
///
/// The pipeline consumes this configuration but does not own where it comes from:
/// the embedding application builds it directly, or loads it with
/// [`Config::from_json_file`] / [`Config::load_or_default`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Output root; every series gets a subdirectory (default: "manga")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Catalog website root used to build catalog and unit links
    #[serde(default = "default_website")]
    pub website: String,

    /// Per-navigation timeout applied to every renderer call (default: 60 seconds)
    #[serde(default = "default_navigation_timeout", with = "duration_serde")]
    pub navigation_timeout: Duration,

    /// Fast mode: fetch the units of a request concurrently instead of one by one
    #[serde(default)]
    pub fast: bool,

    /// Log every pipeline step at info level instead of debug
    #[serde(default)]
    pub verbose: bool,

    /// Maximum units in flight in fast mode (default: 4)
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Capacity of the progress event channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Retry policy for transient renderer failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Archive naming and compression
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            website: default_website(),
            navigation_timeout: default_navigation_timeout(),
            fast: false,
            verbose: false,
            max_concurrent_units: default_max_concurrent_units(),
            event_buffer: default_event_buffer(),
            retry: RetryConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `key=value` configuration file, falling back to defaults if it does not exist
    ///
    /// Lines starting with `#` are comments. Recognised keys:
    /// - `output_dir=<path>`
    /// - `website=<url>`
    /// - `timeout=<seconds>`
    ///
    /// Keys belonging to the browser session (such as `chrome_path`) are ignored here.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Config::default();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                config.apply_key_value_file(&contents)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
            }
            Err(e) => return Err(e.into()),
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply the contents of a `key=value` configuration file on top of this configuration
    pub fn apply_key_value_file(&mut self, contents: &str) -> Result<()> {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(line, "ignoring config line without '='");
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "output_dir" => self.output_dir = PathBuf::from(value),
                "website" => self.website = value.trim_end_matches('/').to_string(),
                "timeout" => {
                    let secs: u64 = value.parse().map_err(|_| Error::Config {
                        message: format!("timeout must be a number of seconds, got '{value}'"),
                        key: Some("timeout".to_string()),
                    })?;
                    self.navigation_timeout = Duration::from_secs(secs);
                }
                other => tracing::debug!(key = other, "ignoring unrelated config key"),
            }
        }
        Ok(())
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "output directory must not be empty".to_string(),
                key: Some("output_dir".to_string()),
            });
        }
        if self.max_concurrent_units == 0 {
            return Err(Error::Config {
                message: "at least one unit must be allowed in flight".to_string(),
                key: Some("max_concurrent_units".to_string()),
            });
        }
        if self.event_buffer == 0 {
            return Err(Error::Config {
                message: "event buffer must hold at least one event".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if self.archive.extension.is_empty() || self.archive.extension.contains('.') {
            return Err(Error::Config {
                message: format!(
                    "archive extension must be a bare extension, got '{}'",
                    self.archive.extension
                ),
                key: Some("archive.extension".to_string()),
            });
        }
        if !(0..=9).contains(&self.archive.compression_level) {
            return Err(Error::Config {
                message: format!(
                    "compression level must be between 0 and 9, got {}",
                    self.archive.compression_level
                ),
                key: Some("archive.compression_level".to_string()),
            });
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff multiplier must be a finite, non-negative number, got {multiplier}"
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Archive naming and compression
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Archive file extension without the dot (default: "cbr")
    #[serde(default = "default_archive_extension")]
    pub extension: String,

    /// Deflate compression level, 0-9 (default: 9)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            extension: default_archive_extension(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("manga")
}

fn default_website() -> String {
    "https://www.japscan.ws".to_string()
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent_units() -> usize {
    4
}

fn default_event_buffer() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_archive_extension() -> String {
    "cbr".to_string()
}

fn default_compression_level() -> i32 {
    9
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
