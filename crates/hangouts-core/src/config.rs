//! Centralized Configuration Management
//!
//! Configuration for the server endpoints, the engine's channel buffers and
//! the durable store backend, consolidated under `HangoutsConfig`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{HangoutError, Result};
use crate::types::Identity;

// ----------------------------------------------------------------------------
// Server Configuration
// ----------------------------------------------------------------------------

/// Where the hangouts server lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket scheme (`ws` or `wss`)
    pub scheme: String,
    /// Host and optional port, e.g. `localhost:3000`
    pub host: String,
    /// HTTP base for the search endpoint; derived from scheme and host when unset
    pub search_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "localhost:3000".to_string(),
            search_base_url: None,
        }
    }
}

impl ServerConfig {
    /// `<scheme>://<host>/hangouts/?username=<identity>`
    pub fn connection_url(&self, identity: &Identity) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://{}/hangouts/", self.scheme, self.host))
            .map_err(|e| HangoutError::config_error(format!("invalid server address: {e}")))?;
        url.query_pairs_mut()
            .append_pair("username", identity.as_str());
        Ok(url)
    }

    /// `GET /hangouts/find?search=<query>&username=<identity>`
    pub fn search_url(&self, query: &str, identity: &Identity) -> Result<Url> {
        let base = match &self.search_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => {
                let http = if self.scheme == "wss" { "https" } else { "http" };
                format!("{}://{}", http, self.host)
            }
        };
        let mut url = Url::parse(&format!("{base}/hangouts/find"))
            .map_err(|e| HangoutError::config_error(format!("invalid search address: {e}")))?;
        url.query_pairs_mut()
            .append_pair("search", query)
            .append_pair("username", identity.as_str());
        Ok(url)
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the engine channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Engine)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Transport → Engine)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (Engine → Transport)
    pub effect_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 128, // server pushes can be bursty
            effect_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Storage Configuration
// ----------------------------------------------------------------------------

/// Durable store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend
    pub data_dir: Option<PathBuf>,
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration for the hangouts engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangoutsConfig {
    pub server: ServerConfig,
    pub channels: ChannelConfig,
    pub storage: StorageConfig,
}

impl HangoutsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory storage and roomy channels
    pub fn testing() -> Self {
        Self {
            server: ServerConfig::default(),
            channels: ChannelConfig::testing(),
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                data_dir: None,
            },
        }
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.server.scheme.as_str(), "ws" | "wss") {
            return Err(HangoutError::config_error(format!(
                "unsupported channel scheme: {}",
                self.server.scheme
            )));
        }
        if self.server.host.trim().is_empty() {
            return Err(HangoutError::config_error("server host is empty"));
        }
        let channels = &self.channels;
        if channels.command_buffer_size == 0
            || channels.event_buffer_size == 0
            || channels.effect_buffer_size == 0
        {
            return Err(HangoutError::config_error("channel buffer sizes must be non-zero"));
        }
        if self.storage.backend == StorageBackend::File && self.storage.data_dir.is_none() {
            return Err(HangoutError::config_error(
                "file storage requires a data directory",
            ));
        }
        Ok(())
    }
}
