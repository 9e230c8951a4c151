//! Configuration module for shelfsync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, defaults, and a platform-appropriate default path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for shelfsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub background: BackgroundConfig,
    pub logging: LoggingConfig,
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Remote row API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the remote row API.
    pub base_url: String,
    /// Bearer token for the row API. `None` means the token is provided at
    /// runtime (environment variable or host auth layer).
    pub access_token: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Page size for foreground (user-initiated) sync runs.
    pub foreground_batch_size: u32,
    /// Page size for background runs; smaller to bound memory and the time
    /// spent inside the OS execution budget.
    pub background_batch_size: u32,
}

/// Background scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Stable task identifier for the OS registration.
    pub task_name: String,
    /// Requested interval between background runs, in seconds. The
    /// scheduler floors this at its OS-enforced minimum.
    pub minimum_interval_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/shelfsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfsync")
            .join("config.yaml")
    }
}

impl BackgroundConfig {
    /// Requested interval as a [`Duration`].
    pub fn minimum_interval(&self) -> Duration {
        Duration::from_secs(self.minimum_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("shelfsync")
                .join("library.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321/rest/v1".to_string(),
            access_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            foreground_batch_size: 500,
            background_batch_size: 100,
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            task_name: "shelfsync.periodic-sync".to_string(),
            minimum_interval_secs: 15 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert!(config.sync.background_batch_size < config.sync.foreground_batch_size);
        assert_eq!(config.background.minimum_interval_secs, 900);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "remote:\n  base_url: https://api.example.com/rest/v1\nsync:\n  foreground_batch_size: 250"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.remote.base_url, "https://api.example.com/rest/v1");
        assert_eq!(config.sync.foreground_batch_size, 250);
        // Unspecified sections keep their defaults
        assert_eq!(config.sync.background_batch_size, 100);
        assert_eq!(config.background.task_name, "shelfsync.periodic-sync");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("shelfsync/config.yaml"));
    }
}
