//! Settings file and endpoint resolution.
//!
//! Settings file sources (highest priority first):
//! 1. `--config` flag or `MODELSHELF_CONFIG` (explicit file path)
//! 2. `MODELSHELF_HOME` (`$MODELSHELF_HOME/config.json`)
//! 3. Default (`~/.modelshelf/data/config.json`)
//!
//! The settings file doubles as the metadata store; its contents are handled
//! by [`crate::library::MetadataStore`]. This module only decides where it
//! lives and which hub endpoint to talk to.

use std::path::PathBuf;

use crate::adapters::hub::DEFAULT_ENDPOINT;

/// Explicit settings file path
pub const CONFIG_ENV: &str = "MODELSHELF_CONFIG";

/// Data directory holding `config.json`
pub const HOME_ENV: &str = "MODELSHELF_HOME";

/// Hub base URL override
pub const HUB_ENDPOINT_ENV: &str = "MODELSHELF_HUB_ENDPOINT";

/// Settings file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Resolved locations for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path to the settings/metadata JSON file
    pub config_path: PathBuf,

    /// Hub base URL
    pub hub_endpoint: String,
}

impl Settings {
    /// Resolve from explicit overrides, falling back to the environment and defaults
    pub fn resolve(config_override: Option<PathBuf>, endpoint_override: Option<String>) -> Self {
        let config_path = resolve_config_path(
            config_override.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from)),
            std::env::var(HOME_ENV).ok().map(PathBuf::from),
        );

        let hub_endpoint = endpoint_override
            .or_else(|| std::env::var(HUB_ENDPOINT_ENV).ok())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            config_path,
            hub_endpoint,
        }
    }
}

/// Default home directory (`~/.modelshelf`)
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".modelshelf")
}

/// Default application data directory (`~/.modelshelf/data`)
pub fn default_app_data_dir() -> PathBuf {
    default_home().join("data")
}

fn resolve_config_path(explicit: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Some(home) = home {
        return home.join(CONFIG_FILE_NAME);
    }
    default_app_data_dir().join(CONFIG_FILE_NAME)
}
