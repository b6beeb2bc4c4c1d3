//! Configuration file support for the CLI.
//!
//! Loads CLI configuration from TOML files. Values are kept as
//! strings here and validated when the session is built from them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use influx_client::{DEFAULT_HOST, DEFAULT_PORT};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Server hostname.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database selected at startup.
    #[serde(default)]
    pub database: Option<String>,

    /// Retention policy selected at startup.
    #[serde(default)]
    pub retention_policy: Option<String>,

    /// Username.
    #[serde(default)]
    pub username: Option<String>,

    /// Password (stored only in config file, not logged).
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Connect over https.
    #[serde(default)]
    pub ssl: bool,

    /// Skip certificate verification.
    #[serde(default)]
    pub unsafe_ssl: bool,

    /// Output format: json, csv or column.
    #[serde(default = "default_format")]
    pub format: String,

    /// Timestamp precision: rfc3339, h, m, s, ms, u or ns.
    #[serde(default = "default_precision")]
    pub precision: String,

    /// Write consistency: any, one, quorum or all.
    #[serde(default = "default_consistency")]
    pub consistency: String,

    /// Pretty-print JSON output.
    #[serde(default)]
    pub pretty: bool,

    /// Import throttle in points per second, 0 for unlimited.
    #[serde(default)]
    pub pps: u32,

    /// History file path.
    #[serde(default)]
    pub history_file: Option<PathBuf>,

    /// Maximum history size.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_format() -> String {
    "column".to_string()
}

fn default_precision() -> String {
    "ns".to_string()
}

fn default_consistency() -> String {
    "all".to_string()
}

fn default_history_size() -> usize {
    1000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: None,
            retention_policy: None,
            username: None,
            password: None,
            ssl: false,
            unsafe_ssl: false,
            format: default_format(),
            precision: default_precision(),
            consistency: default_consistency(),
            pretty: false,
            pps: 0,
            history_file: None,
            history_size: default_history_size(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to a file.
    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads the default configuration file.
    ///
    /// Looks in the following locations:
    /// 1. ~/.config/influx/config.toml
    /// 2. ~/.influx/config.toml
    /// 3. Returns default if not found
    pub fn load_default() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("influx").join("config.toml");
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".influx").join("config.toml");
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Returns the history file, falling back to `~/.influx_history`.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".influx_history")))
    }

    /// Returns a builder for configuration.
    #[cfg(test)]
    pub fn builder() -> CliConfigBuilder {
        CliConfigBuilder::new()
    }
}

/// Builder for CLI configuration.
#[cfg(test)]
#[derive(Default)]
pub struct CliConfigBuilder {
    config: CliConfig,
}

#[cfg(test)]
impl CliConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    /// Sets the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Sets the output format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.config.format = format.into();
        self
    }

    /// Sets the timestamp precision.
    pub fn precision(mut self, precision: impl Into<String>) -> Self {
        self.config.precision = precision.into();
        self
    }

    /// Sets the write consistency.
    pub fn consistency(mut self, consistency: impl Into<String>) -> Self {
        self.config.consistency = consistency.into();
        self
    }

    /// Sets the import throttle.
    pub fn pps(mut self, pps: u32) -> Self {
        self.config.pps = pps;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CliConfig {
        self.config
    }
}
