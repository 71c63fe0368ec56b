use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dbforge_engine::EngineOptions;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dbforge.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error("a connection string is required (use --conn, a positional argument or --profile)")]
    MissingConnection,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Contents of `dbforge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub acquire_timeout_secs: u64,
    pub maintenance_database: String,
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let defaults = EngineOptions::default();
        Self {
            acquire_timeout_secs: defaults.acquire_timeout.as_secs(),
            maintenance_database: defaults.maintenance_database,
            profiles: BTreeMap::new(),
        }
    }
}

/// A named database target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub url: String,
    #[serde(default)]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub maintenance_database: Option<String>,
}

/// Connection, schema file and engine options of one invocation.
#[derive(Debug, Clone)]
pub struct Target {
    pub connection: String,
    pub schema: Option<PathBuf>,
    pub options: EngineOptions,
}

/// Command-line values that override the selected profile.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub connection: Option<String>,
    pub profile: Option<String>,
    pub schema: Option<PathBuf>,
    pub maintenance_database: Option<String>,
}

impl CliConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `path`, or `dbforge.toml` when it exists, or the defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn profile(&self, name: &str) -> ConfigResult<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    /// Merge the overrides with the named profile and the file defaults.
    pub fn resolve(&self, overrides: Overrides) -> ConfigResult<Target> {
        let profile = overrides
            .profile
            .as_deref()
            .map(|name| self.profile(name))
            .transpose()?;

        let connection = overrides
            .connection
            .or_else(|| profile.map(|profile| profile.url.clone()))
            .ok_or(ConfigError::MissingConnection)?;
        let schema = overrides
            .schema
            .or_else(|| profile.and_then(|profile| profile.schema.clone()));
        let maintenance_database = overrides
            .maintenance_database
            .or_else(|| profile.and_then(|profile| profile.maintenance_database.clone()))
            .unwrap_or_else(|| self.maintenance_database.clone());

        Ok(Target {
            connection,
            schema,
            options: EngineOptions {
                acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
                maintenance_database,
            },
        })
    }
}
