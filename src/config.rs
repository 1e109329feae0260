//! Store configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, then `PREFSTORE__*` environment variables (`__` separates nested
//! keys, e.g. `PREFSTORE__LOGGING__LEVEL=debug`).

use crate::error::PrefsError;
use crate::logging::LoggingConfig;
use crate::node::NodeOptions;
use crate::types::CacheMode;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the dotfolder under the home directory used when no root is set
pub const DEFAULT_ROOT_DIR_NAME: &str = ".prefstore";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root node directory; None means `~/.prefstore`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Read caching policy for every node opened from this config
    pub cache: CacheMode,

    /// Write indented JSON documents
    pub pretty: bool,

    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: None,
            cache: CacheMode::Uncached,
            pretty: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from defaults and the environment.
    pub fn load() -> Result<StoreConfig, PrefsError> {
        let builder = add_environment(builder_with_defaults()?);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<StoreConfig, PrefsError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = add_environment(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Write this configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), PrefsError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PrefsError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PrefsError::io(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| PrefsError::io(path, e))
    }

    /// Root directory, resolving the home-directory default.
    pub fn root_path(&self) -> Result<PathBuf, PrefsError> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => default_root(),
        }
    }

    pub fn node_options(&self) -> NodeOptions {
        NodeOptions {
            cache: self.cache,
            pretty: self.pretty,
        }
    }
}

/// `~/.prefstore`
pub fn default_root() -> Result<PathBuf, PrefsError> {
    let base_dirs = directories::BaseDirs::new().ok_or_else(|| {
        PrefsError::Config("Could not determine home directory".to_string())
    })?;
    Ok(base_dirs.home_dir().join(DEFAULT_ROOT_DIR_NAME))
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, PrefsError> {
    Ok(Config::builder()
        .set_default("cache", "uncached")?
        .set_default("pretty", true)?)
}

fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("PREFSTORE")
            .separator("__")
            .try_parsing(true),
    )
}
