//! Server configuration loading from file and environment variables.

use posthread_comments::DEFAULT_SUBSCRIBER_BUFFER;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Comment engine settings.
    #[serde(default)]
    pub comments: CommentsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where users, posts, and comments are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "database.backend",
                value: other.to_string(),
            }),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file. Ignored by the memory backend.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "posthread_comments=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Comment engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentsConfig {
    /// Events buffered per live subscriber before new ones are dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "posthread.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_subscriber_buffer() -> usize {
    DEFAULT_SUBSCRIBER_BUFFER
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override held an unusable value.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `POSTHREAD_HOST` overrides `server.host`
/// - `POSTHREAD_PORT` overrides `server.port`
/// - `POSTHREAD_DB_BACKEND` overrides `database.backend` (`sqlite` or `memory`)
/// - `POSTHREAD_DB_PATH` overrides `database.path`
/// - `POSTHREAD_LOG_LEVEL` overrides `logging.level`
/// - `POSTHREAD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `POSTHREAD_SUBSCRIBER_BUFFER` overrides `comments.subscriber_buffer`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if `POSTHREAD_DB_BACKEND` names an unknown backend.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], reading overrides through `lookup` instead of the
/// process environment.
pub fn load_config_with<F>(path: Option<&str>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Some(host) = lookup("POSTHREAD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("POSTHREAD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(backend) = lookup("POSTHREAD_DB_BACKEND") {
        config.database.backend = backend.parse()?;
    }
    if let Some(db_path) = lookup("POSTHREAD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("POSTHREAD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("POSTHREAD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(buffer) = lookup("POSTHREAD_SUBSCRIBER_BUFFER") {
        if let Ok(parsed) = buffer.parse() {
            config.comments.subscriber_buffer = parsed;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = load_config_with(Some("/nonexistent/posthread.toml"), no_env).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StorageBackend::Sqlite);
        assert_eq!(config.comments.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
        assert!(!config.logging.json);
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[database]
backend = "memory"

[comments]
subscriber_buffer = 32
"#
        )
        .unwrap();

        let config = load_config_with(file.path().to_str(), no_env).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.path, "posthread.db");
        assert_eq!(config.comments.subscriber_buffer, 32);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("POSTHREAD_PORT", "7000"),
            ("POSTHREAD_DB_BACKEND", "Memory"),
            ("POSTHREAD_DB_PATH", "/tmp/other.db"),
            ("POSTHREAD_LOG_JSON", "1"),
            ("POSTHREAD_SUBSCRIBER_BUFFER", "4"),
        ]
        .into_iter()
        .collect();

        let config =
            load_config_with(None, |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.path, "/tmp/other.db");
        assert!(config.logging.json);
        assert_eq!(config.comments.subscriber_buffer, 4);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = load_config_with(None, |key| {
            (key == "POSTHREAD_DB_BACKEND").then(|| "postgres".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
