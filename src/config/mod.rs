//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::gesture::mock::DEFAULT_GESTURES;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Gesture backend connection settings
    pub backend: BackendConfig,

    /// Session settings
    pub session: SessionSettings,

    /// Scripted backend settings
    pub mock: MockBackendConfig,

    /// Console settings
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// WebSocket endpoint of the gesture-detection backend
    pub endpoint: String,

    /// Connection attempt timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// How long a graceful close may wait for the backend's acknowledgement
    pub close_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Status shown before the backend has reported anything
    pub initial_status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockBackendConfig {
    /// Listen address for `gesturelink mock-backend`
    pub bind_addr: String,

    /// Delay between emitted status frames in milliseconds
    pub frame_interval_ms: u64,

    /// Status labels cycled while detection is running
    pub gestures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    /// Enable colors in console output
    pub enable_colors: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Write logs to a daily-rolling file in addition to stderr
    pub file_output: bool,

    /// Absolute or relative path of the log file; rotated files get a date suffix
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            backend: BackendConfig::default(),
            session: SessionSettings::default(),
            mock: MockBackendConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:5000".to_string(),
            connect_timeout_ms: 5000,
            close_timeout_ms: 2000,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_status: "No gesture detected".to_string(),
        }
    }
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            frame_interval_ms: 30,
            gestures: DEFAULT_GESTURES.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enable_colors: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_output: false,
            file_path: "logs/gesturelink.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(&path).unwrap_or_else(|err| {
            tracing::warn!("Failed to load config: {:#}, using defaults", err);
            Self::fallback()
        })
    }

    /// Defaults with environment overrides, used when no file can be loaded
    pub fn fallback() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        if let Err(err) = config.validate() {
            tracing::warn!("Ignoring invalid environment overrides: {}", err);
            config = Self::default();
        }
        config
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // GESTURELINK_LOG_LEVEL - logging level
        if let Some(log_level) = lookup("GESTURELINK_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // GESTURELINK_LOG_FILE_PATH - logging destination file
        if let Some(file_path) = lookup("GESTURELINK_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }

        // GESTURELINK_LOG_FILE_OUTPUT - enable file logging
        if let Some(file_output) = lookup("GESTURELINK_LOG_FILE_OUTPUT") {
            self.log.file_output = file_output.parse().unwrap_or(self.log.file_output);
        }

        // GESTURELINK_BACKEND_ENDPOINT - backend WebSocket URL
        if let Some(endpoint) = lookup("GESTURELINK_BACKEND_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }

        // GESTURELINK_BACKEND_CONNECT_TIMEOUT_MS - connect timeout
        if let Some(timeout) = lookup("GESTURELINK_BACKEND_CONNECT_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.backend.connect_timeout_ms = value;
            }
        }

        // GESTURELINK_BACKEND_CLOSE_TIMEOUT_MS - close timeout
        if let Some(timeout) = lookup("GESTURELINK_BACKEND_CLOSE_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.backend.close_timeout_ms = value;
            }
        }

        // GESTURELINK_SESSION_INITIAL_STATUS - placeholder status
        if let Some(status) = lookup("GESTURELINK_SESSION_INITIAL_STATUS") {
            self.session.initial_status = status;
        }

        // GESTURELINK_MOCK_BIND_ADDR - scripted backend listen address
        if let Some(bind_addr) = lookup("GESTURELINK_MOCK_BIND_ADDR") {
            self.mock.bind_addr = bind_addr;
        }

        // GESTURELINK_MOCK_FRAME_INTERVAL_MS - scripted backend frame interval
        if let Some(interval) = lookup("GESTURELINK_MOCK_FRAME_INTERVAL_MS") {
            if let Ok(value) = interval.parse::<u64>() {
                self.mock.frame_interval_ms = value;
            }
        }

        // GESTURELINK_MOCK_GESTURES - comma-separated label cycle
        if let Some(gestures) = lookup("GESTURELINK_MOCK_GESTURES") {
            self.mock.gestures = split_list(&gestures);
        }

        // GESTURELINK_UI_ENABLE_COLORS - enable colors
        if let Some(enable_colors) = lookup("GESTURELINK_UI_ENABLE_COLORS") {
            self.ui.enable_colors = enable_colors.parse().unwrap_or(self.ui.enable_colors);
        }
    }

    /// Set a single value by dotted key, validating the result
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        let key_normalized = key.to_ascii_lowercase().replace('-', "_");

        match key_normalized.as_str() {
            "log_level" => updated.log_level = value.to_string(),
            "log.file_path" => updated.log.file_path = value.to_string(),
            "log.file_output" => updated.log.file_output = parse_value(key, value)?,
            "backend.endpoint" | "endpoint" => updated.backend.endpoint = value.to_string(),
            "backend.connect_timeout_ms" => {
                updated.backend.connect_timeout_ms = parse_value(key, value)?
            }
            "backend.close_timeout_ms" => updated.backend.close_timeout_ms = parse_value(key, value)?,
            "session.initial_status" => updated.session.initial_status = value.to_string(),
            "mock.bind_addr" => updated.mock.bind_addr = value.to_string(),
            "mock.frame_interval_ms" => updated.mock.frame_interval_ms = parse_value(key, value)?,
            "mock.gestures" => updated.mock.gestures = split_list(value),
            "ui.enable_colors" => updated.ui.enable_colors = parse_value(key, value)?,
            other => anyhow::bail!("Unsupported config key: {}", other),
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.backend.endpoint.trim();
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            anyhow::bail!(
                "backend.endpoint must be a ws:// or wss:// URL, got: {}",
                self.backend.endpoint
            );
        }

        if self.backend.connect_timeout_ms == 0 {
            anyhow::bail!("backend.connect_timeout_ms must be greater than 0");
        }

        if self.backend.close_timeout_ms == 0 {
            anyhow::bail!("backend.close_timeout_ms must be greater than 0");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        if self.mock.frame_interval_ms == 0 {
            anyhow::bail!("mock.frame_interval_ms must be greater than 0");
        }

        if self.mock.gestures.is_empty() {
            anyhow::bail!("mock.gestures must contain at least one label");
        }

        if self.mock.bind_addr.trim().is_empty() {
            anyhow::bail!("mock.bind_addr must not be empty");
        }

        Ok(())
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        println!("{}", content);
        Ok(())
    }

    /// Display configuration management help
    pub fn display_help() -> Result<()> {
        println!("Configuration management commands:");
        println!("  gesturelink config show              - Show current configuration");
        println!("  gesturelink config set <key> <value> - Set configuration value");
        println!("  gesturelink config reset             - Reset to default configuration");
        Ok(())
    }

    /// Handle configuration command
    ///
    /// `config` is the configuration already loaded from `path` (or the
    /// fallback when it could not be loaded).
    pub fn handle_command(
        action: &Option<crate::cli::ConfigAction>,
        config: &Config,
        path: &str,
    ) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => {
                println!("Configuration from {}:", path);
                config.display()?;
            }
            Some(crate::cli::ConfigAction::Set { key, value }) => {
                let mut config = config.clone();
                config.set_value(key, value)?;
                config.save_to_file(path)?;
                println!("Updated {} = {} in {}", key, value, path);
            }
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(path)?;
                println!("Configuration reset to defaults in {}", path);
                default_config.display()?;
            }
            None => {
                Config::display_help()?;
            }
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, value, e))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
