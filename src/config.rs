//! Configuration management for keyfreq
//!
//! Settings live in a TOML file at a platform-specific location. Command line
//! flags take precedence over anything loaded from it.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/keyfreq/config.toml` |
//! | macOS | `~/Library/Application Support/keyfreq/config.toml` |
//! | Windows | `%APPDATA%\keyfreq\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use keyfreq::Config;
//! use keyfreq::format::CaptureMode;
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.capture.mode = CaptureMode::Scancode;
//! config.save().expect("Failed to save config");
//! ```

use crate::format::CaptureMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "keyfreq";

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine {0} directory")]
    NoDir(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file, creating its directory if needed.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoDir("config"))?;
    let app_dir = config_dir.join(APP_DIR);
    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join("config.toml"))
}

/// Directory holding captured logs by default
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(ConfigError::NoDir("data"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Capture tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Record produced characters or physical scancodes
    pub mode: CaptureMode,
    /// Split scancode transitions into one log per device
    pub per_device: bool,
    /// Log file for simple capture
    pub output: Option<PathBuf>,
    /// Directory for per-device logs
    pub output_dir: Option<PathBuf>,
    /// Events buffered between the source thread and the recorder
    pub queue_capacity: usize,
    /// Source polling interval when idle, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Character,
            per_device: false,
            output: None,
            output_dir: None,
            queue_capacity: 1024,
            poll_interval_ms: 5,
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Configured simple log path, or `<data dir>/keyfreq/keys.log`
    pub fn output_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.output {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("keys.log")),
        }
    }

    /// Configured per-device directory, or `<data dir>/keyfreq/devices`
    pub fn output_dir_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(data_dir()?.join("devices")),
        }
    }
}

/// Reporting tool settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Read inputs as per-device logs
    pub per_device: bool,
    /// Print key names next to codes
    pub show_names: bool,
}

impl Config {
    /// Loads the default config file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.capture.mode, CaptureMode::Character);
        assert!(!config.capture.per_device);
        assert_eq!(config.capture.queue_capacity, 1024);
        assert_eq!(config.capture.poll_interval(), Duration::from_millis(5));
        assert!(!config.report.show_names);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let mut config = Config::default();
        config.capture.poll_interval_ms = 0;
        assert_eq!(config.capture.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn config_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.capture.mode = CaptureMode::Scancode;
        config.capture.output_dir = Some(PathBuf::from("/var/log/keys"));
        config.report.per_device = true;
        config.save_to(&path).expect("Failed to save config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn config_load_missing_file_fails() {
        let result = Config::load_from(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[capture]
mode = "scancode"
per_device = true
output_dir = "/tmp/keys"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.capture.mode, CaptureMode::Scancode);
        assert!(config.capture.per_device);
        assert_eq!(config.capture.output_dir_path().unwrap(), PathBuf::from("/tmp/keys"));
        assert_eq!(config.capture.queue_capacity, 1024);
        assert_eq!(config.report, ReportConfig::default());
    }

    #[test]
    fn unknown_mode_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[capture]\nmode = \"virtual\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        let toml_str = toml::to_string_pretty(&Config::default()).expect("Failed to serialize");
        assert!(toml_str.contains("[capture]"));
        assert!(toml_str.contains("mode = \"character\""));
        assert!(toml_str.contains("[report]"));
    }

    #[test]
    fn explicit_output_wins() {
        let mut config = CaptureConfig::default();
        config.output = Some(PathBuf::from("mine.log"));
        assert_eq!(config.output_path().unwrap(), PathBuf::from("mine.log"));
    }
}
