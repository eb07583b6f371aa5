//! Configuration types.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the HTTP surface.
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default collection holding task documents.
pub const DEFAULT_COLLECTION: &str = "todos";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            http: HttpConfig::default(),
        }
    }
}

/// Stateless HTTP CRUD surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Collection served under `/api/tasks`. Unscoped.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            collection: default_collection(),
        }
    }
}

/// Realtime engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Collection holding task documents.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// How often to check the database for writes from other processes.
    /// Zero disables the check.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("task-sync/tasks.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from a single file, without tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null.
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }
}
