//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/watchlog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/watchlog/` (~/.config/watchlog/)
//! - Data: `$XDG_DATA_HOME/watchlog/` (~/.local/share/watchlog/)
//! - State/Logs: `$XDG_STATE_HOME/watchlog/` (~/.local/state/watchlog/)

use crate::error::{Error, Result};
use crate::types::from_db_timestamp;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "WATCHLOG_PORT";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Aggregation configuration
    #[serde(default)]
    pub stats: StatsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database location
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override for the SQLite file (defaults to the XDG data dir)
    pub path: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    /// `host:port` suitable for binding a listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

/// How per-channel and per-year duration sums are computed
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Use SQL if the connection has `iso_seconds`, rows otherwise
    #[default]
    Auto,
    /// Always reduce inside SQLite
    Sql,
    /// Always fetch rows and reduce in Rust
    Rows,
}

/// Aggregation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// Watch events before this instant are ignored (RFC 3339)
    #[serde(default = "default_cutoff")]
    pub cutoff: String,

    #[serde(default)]
    pub duration_reduction: ReductionMode,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            duration_reduction: ReductionMode::default(),
        }
    }
}

impl StatsConfig {
    /// Parsed cutoff timestamp
    pub fn cutoff(&self) -> Result<DateTime<Utc>> {
        from_db_timestamp(&self.cutoff)
            .ok_or_else(|| Error::Config(format!("stats.cutoff is not RFC 3339: {}", self.cutoff)))
    }
}

fn default_cutoff() -> String {
    "2017-01-01T00:00:00Z".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            let mut config = Config::default();
            config.apply_env()?;
            config.validate()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let mut config = Self::parse(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without consulting the environment
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Apply `WATCHLOG_PORT` if set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a port: {}", PORT_ENV, port)))?;
        }
        Ok(())
    }

    /// Reject values that would only fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }
        self.stats.cutoff()?;
        Ok(())
    }

    /// Database file to open, honoring `[database] path`
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/watchlog/config.toml` (~/.config/watchlog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("watchlog").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/watchlog/` (~/.local/share/watchlog/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("watchlog")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/watchlog/` (~/.local/state/watchlog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("watchlog")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/watchlog/watchlog.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("watchlog.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/watchlog/watchlog.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("watchlog.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.stats.duration_reduction, ReductionMode::Auto);
        assert_eq!(
            to_string(config.stats.cutoff().unwrap()),
            "2017-01-01T00:00:00Z"
        );
        assert!(config.validate().is_ok());
    }

    fn to_string(ts: DateTime<Utc>) -> String {
        crate::types::to_db_timestamp(&ts)
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
path = "/tmp/history.db"

[server]
port = 8080
cors_origins = []

[stats]
cutoff = "2020-06-01T00:00:00Z"
duration_reduction = "rows"

[logging]
level = "debug"
"#;
        let config = Config::parse(toml).unwrap();

        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/history.db")
        );
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.stats.duration_reduction, ReductionMode::Rows);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = Config::parse("[server]\nport = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config::parse("[stats]\ncutoff = \"last tuesday\"\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_reduction_mode_is_parse_error() {
        let err = Config::parse("[stats]\nduration_reduction = \"magic\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_paths() {
        assert!(Config::database_path().ends_with("watchlog/watchlog.db"));
        assert!(Config::log_path().ends_with("watchlog/watchlog.log"));
        assert!(Config::config_path().ends_with("watchlog/config.toml"));
    }
}
