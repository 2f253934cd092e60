//! Configuration types for url-downloader

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Main configuration for the download pipeline
///
/// Every field has a default, so an empty JSON object (`{}`) is a valid config file.
/// The CLI loads an optional file first and then applies its flag overrides on top.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of downloads in flight at once, K (default: 10)
    ///
    /// Also used as the capacity of the URL and result queues, so a slow
    /// download stage backpressures the reader.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Time from pipeline start after which every stage stops (default: 5 seconds)
    #[serde(default = "default_shutdown_deadline", with = "duration_serde")]
    pub shutdown_deadline: Duration,

    /// Output directory (default: `<input path without extension>/downloads`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Extension given to every persisted file, without the dot (default: "txt")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Value sent in the `User-Agent` header (default: "url-downloader/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            shutdown_deadline: default_shutdown_deadline(),
            output_dir: None,
            file_extension: default_file_extension(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing keys take their defaults. The result is validated before it is returned.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::PathIo {
            action: "read config file",
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("max_workers", "max_workers must be at least 1"));
        }
        if self.shutdown_deadline.is_zero() {
            return Err(Error::config(
                "shutdown_deadline",
                "shutdown_deadline must be greater than zero",
            ));
        }
        if self.file_extension.is_empty()
            || self.file_extension.contains(['/', '\\', '.'])
        {
            return Err(Error::config(
                "file_extension",
                format!(
                    "file_extension '{}' must be non-empty and contain no dots or path separators",
                    self.file_extension
                ),
            ));
        }
        Ok(())
    }

    /// Directory that persisted files are written to for the given input file
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => crate::utils::input_work_dir(input).join("downloads"),
        }
    }
}

// Default value functions
fn default_max_workers() -> usize {
    10
}

fn default_shutdown_deadline() -> Duration {
    Duration::from_secs(5)
}

fn default_file_extension() -> String {
    "txt".to_string()
}

fn default_user_agent() -> String {
    format!("url-downloader/{}", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper
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
