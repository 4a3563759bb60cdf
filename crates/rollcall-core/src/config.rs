//! Application configuration management.
//!
//! Handles loading, saving, and validating rollcall configuration including:
//! - Bluetooth adapter selection
//! - Scan window and staleness tuning
//! - Session registry polling
//! - Server listen port

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scan::{ScanPolicy, DEFAULT_STALENESS};

/// Configuration-specific failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found at: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file exists but could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized for writing.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration was parsed but contains an invalid value.
    #[error("configuration validation failed: {field}: {message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    /// Radio backend settings.
    pub radio: RadioConfig,

    /// Scanner tuning.
    pub scan: ScanConfig,

    /// Session registry polling.
    pub registry: RegistryConfig,

    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Radio backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Bluetooth adapter name (e.g. "hci0"). `None` uses the default adapter.
    pub adapter: Option<String>,
}

/// Scanner tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Fixed scan window in seconds. `None` scans continuously until stopped.
    pub window_secs: Option<u64>,

    /// Seconds after the last sighting before a detection ages out.
    pub staleness_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_secs: None,
            staleness_secs: DEFAULT_STALENESS.as_secs(),
        }
    }
}

/// Session registry polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds between active-session list refreshes.
    pub poll_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen_port: 3000 }
    }
}

impl RollcallConfig {
    /// Load configuration from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, unparsable, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default path, falling back to defaults
    /// when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        match Self::load(&path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    /// Save configuration to the given path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The platform configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error when no config directory can be determined.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        // Deployed on Linux hosts: /etc/rollcall/config.toml
        // For development elsewhere: platform config dir
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/rollcall/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs =
                directories::ProjectDirs::from("", "", "rollcall").ok_or_else(|| {
                    ConfigError::Validation {
                        field: "config_dir",
                        message: "cannot determine config directory".into(),
                    }
                })?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }

    /// Check value-level constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.staleness_secs == 0 {
            return Err(ConfigError::Validation {
                field: "scan.staleness_secs",
                message: "must be at least 1 second".into(),
            });
        }
        if self.scan.window_secs == Some(0) {
            return Err(ConfigError::Validation {
                field: "scan.window_secs",
                message: "must be at least 1 second when set".into(),
            });
        }
        if self.registry.poll_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "registry.poll_interval_secs",
                message: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }

    /// The scan policy these settings describe.
    #[must_use]
    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            window: self.scan.window_secs.map(Duration::from_secs),
            staleness: Duration::from_secs(self.scan.staleness_secs),
        }
    }

    /// Registry poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.registry.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RollcallConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scan.staleness_secs, 30);
        assert!(config.scan.window_secs.is_none());
        assert_eq!(config.registry.poll_interval_secs, 5);
        assert_eq!(config.server.listen_port, 3000);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = RollcallConfig::default();
        config.radio.adapter = Some("hci1".into());
        config.scan.window_secs = Some(120);
        config.save(&path).unwrap();

        let loaded = RollcallConfig::load(&path).unwrap();
        assert_eq!(loaded.radio.adapter.as_deref(), Some("hci1"));
        assert_eq!(loaded.scan.window_secs, Some(120));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = RollcallConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan]\nstaleness_secs = 60\n").unwrap();

        let loaded = RollcallConfig::load(&path).unwrap();
        assert_eq!(loaded.scan.staleness_secs, 60);
        assert_eq!(loaded.server.listen_port, 3000);
    }

    #[test]
    fn zero_staleness_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan]\nstaleness_secs = 0\n").unwrap();

        let err = RollcallConfig::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation {
                field: "scan.staleness_secs",
                ..
            }
        ));
    }

    #[test]
    fn scan_policy_reflects_settings() {
        let mut config = RollcallConfig::default();
        config.scan.window_secs = Some(90);
        let policy = config.scan_policy();
        assert_eq!(policy.window, Some(Duration::from_secs(90)));
        assert_eq!(policy.staleness, Duration::from_secs(30));
    }
}
