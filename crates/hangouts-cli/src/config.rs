//! Hangouts CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first: built-in
//! defaults, `hangouts.toml` in the working directory, the user config file,
//! `HANGOUTS_*` environment variables, then command-line flags.
//!
//! Environment variables use `__` to separate sections, e.g.
//! `HANGOUTS_ENGINE__SERVER__HOST=example.org`.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use hangouts_core::{HangoutsConfig, StorageBackend};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the hangouts CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliAppConfig {
    /// Engine configuration (server, channels, storage)
    pub engine: HangoutsConfig,
    pub identity: IdentityConfig,
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub username: Option<String>,
    /// Bearer token sent to the search endpoint
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    pub verbose: bool,
    /// How long `send` waits for the channel to open
    pub connect_timeout_secs: u64,
    /// How long `send` waits for the acknowledgement
    pub ack_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            connect_timeout_secs: 10,
            ack_timeout_secs: 30,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliAppConfig {
    /// Load every layer and apply the command-line overrides
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut figment = Self::base_figment();
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("HANGOUTS_").split("__"));

        let mut config: CliAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {e}")))?;
        config.apply_overrides(cli);
        config.fill_data_dir();
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a single TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: CliAppConfig = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                ConfigError::Loading(format!(
                    "Failed to load from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;
        Ok(config)
    }

    fn base_figment() -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("hangouts.toml"));
        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        figment
    }

    /// `<config dir>/hangouts/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hangouts").join("config.toml"))
    }

    /// `<data dir>/hangouts`
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("hangouts"))
    }

    /// Command-line flags win over every other layer
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(username) = &cli.username {
            self.identity.username = Some(username.clone());
        }
        if let Some(token) = &cli.token {
            self.identity.token = Some(token.clone());
        }
        if let Some(host) = &cli.host {
            self.engine.server.host = host.clone();
        }
        if let Some(dir) = &cli.data_dir {
            self.engine.storage.data_dir = Some(PathBuf::from(dir));
        }
        if cli.verbose {
            self.cli.verbose = true;
        }
    }

    fn fill_data_dir(&mut self) {
        if self.engine.storage.backend == StorageBackend::File
            && self.engine.storage.data_dir.is_none()
        {
            self.engine.storage.data_dir = Self::default_data_dir();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.identity.username.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ConfigError::Validation(
                    "a username is required (--username or identity.username)".to_string(),
                ))
            }
            Some(_) => {}
        }
        if self.cli.connect_timeout_secs == 0 || self.cli.ack_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        self.engine
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// The validated username
    pub fn username(&self) -> &str {
        self.identity.username.as_deref().unwrap_or_default()
    }

    pub fn example_config() -> Result<String, ConfigError> {
        let mut example = CliAppConfig::default();
        example.identity.username = Some("alice".to_string());
        example.engine.storage.data_dir = Self::default_data_dir();
        Ok(toml::to_string_pretty(&example)?)
    }

    /// Write the example configuration to `path` (the user config file when
    /// unset) and read it back. An existing file is only replaced with `force`.
    pub fn init_config(path: Option<&Path>, force: bool) -> Result<(PathBuf, Self), ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path().ok_or_else(|| {
                ConfigError::Loading("no user configuration directory on this platform".to_string())
            })?,
        };
        if path.exists() && !force {
            return Err(ConfigError::Validation(format!(
                "{} already exists (use --force to replace it)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::example_config()?)?;
        let config = Self::load_from_file(&path)?;
        Ok((path, config))
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Configuration encoding error: {0}")]
    Encoding(#[from] toml::ser::Error),

    #[error("Configuration file error: {0}")]
    Io(#[from] std::io::Error),
}
