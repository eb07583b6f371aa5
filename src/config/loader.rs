//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_CONFIG_PATH: &str = "TASK_SYNC_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "TASK_SYNC_DB_PATH";
pub const ENV_PORT: &str = "TASK_SYNC_PORT";
pub const ENV_USER_DIR: &str = "TASK_SYNC_USER_DIR";
pub const ENV_PROJECT_DIR: &str = "TASK_SYNC_PROJECT_DIR";

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `$CWD/task-sync/`
    Project = 1,
    /// `~/.task-sync/`
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var(ENV_USER_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-sync")));

        let project_dir = std::env::var(ENV_PROJECT_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-sync")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn config_file(&self, tier: ConfigTier) -> Option<PathBuf> {
        let dir = match tier {
            ConfigTier::Project => self.project_dir.as_ref(),
            ConfigTier::User => self.user_dir.as_ref(),
            _ => None,
        }?;
        Some(dir.join(CONFIG_FILE))
    }
}

/// Read one tier's YAML file. Missing files are skipped silently; unreadable
/// or invalid ones with a warning.
fn read_tier(tier: ConfigTier, path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping {} config {}: {}", tier, path.display(), e);
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!("Loaded {} config from {}", tier, path.display());
            Some(value)
        }
        Err(e) => {
            warn!("Skipping {} config {}: {}", tier, path.display(), e);
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Highest-priority file that contributed, if any.
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    ///
    /// `TASK_SYNC_CONFIG_PATH` replaces the file tiers with a single file;
    /// environment overrides still apply on top.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        if let Ok(explicit_path) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(&explicit_path);
            return Self::load_file(paths, path);
        }

        let mut configs: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;

        for tier in [ConfigTier::Project, ConfigTier::User] {
            let Some(file) = paths.config_file(tier) else {
                continue;
            };
            if let Some(value) = read_tier(tier, &file) {
                configs.push(value);
                config_path = Some(file);
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    /// Load a single explicit file on top of the defaults.
    pub fn load_file(paths: ConfigPaths, path: PathBuf) -> Result<Self> {
        let mut config = Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        Self::apply_env_overrides(&mut config);
        Ok(Self {
            paths,
            config,
            config_path: Some(path),
        })
    }

    fn apply_env_overrides(config: &mut Config) {
        apply_overrides(config, |key| std::env::var(key).ok());
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Apply environment-tier overrides, reading variables through `var`.
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = var(ENV_DB_PATH) {
        config.server.db_path = PathBuf::from(db_path);
    }

    if let Some(port) = var(ENV_PORT) {
        match port.parse::<u16>() {
            Ok(port) => config.server.http.port = port,
            Err(_) => warn!("Ignoring {}={:?}: not a port number", ENV_PORT, port),
        }
    }
}
