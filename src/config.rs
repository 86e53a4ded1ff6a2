// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::client::core::{DEFAULT_API_URL, DEFAULT_AUTH_URL, DEFAULT_PERMISSIONS};
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

fn default_database_path() -> PathBuf {
    let relative = "Library/Application Support/Cultured Code/Things/Database.xml";
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(relative),
        None => PathBuf::from(relative),
    }
}

fn default_list_name() -> String {
    "Inbox".to_string()
}

fn default_ignored_tags() -> Vec<String> {
    vec!["High".to_string(), "Medium".to_string(), "Low".to_string()]
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_permissions() -> String {
    DEFAULT_PERMISSIONS.to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub shared_secret: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// List for tasks that don't belong to a project.
    #[serde(default = "default_list_name")]
    pub default_list_name: String,
    /// Create every task and delete it again right away.
    #[serde(default)]
    pub dry_run: bool,
    /// Tag names never carried over (Things' built-in priority tags).
    #[serde(default = "default_ignored_tags")]
    pub ignored_tags: Vec<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            shared_secret: String::new(),
            database_path: default_database_path(),
            default_list_name: default_list_name(),
            dry_run: false,
            ignored_tags: default_ignored_tags(),
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            permissions: default_permissions(),
        }
    }
}

/// Values given on the command line for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub default_list_name: Option<String>,
    pub dry_run: bool,
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(config) => Ok(config),
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Whether `err` means the config file does not exist, as opposed to being unreadable.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.database_path {
            self.database_path = path.clone();
        }
        if let Some(list) = &overrides.default_list_name {
            self.default_list_name = list.clone();
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
    }

    pub fn ignored_tag_set(&self) -> HashSet<String> {
        self.ignored_tags.iter().cloned().collect()
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.shared_secret.is_empty()
    }
}
