//! Configuration system for Duet
//!
//! Supports TOML configuration files with sensible defaults.
//! Configuration is loaded from:
//! - macOS: ~/Library/Application Support/duet/config.toml
//! - Linux: ~/.config/duet/config.toml
//! - Windows: %APPDATA%/duet/config.toml
//!
//! Environment variables are applied on top of the file, see
//! [`Config::apply_env`].

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::ice::{IceConfig, MeteredCredentials, TurnServer};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signal server settings
    pub server: ServerConfig,
    /// ICE servers handed to browsers
    pub ice: IceConfig,
}

/// Signal server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind: IpAddr,
    /// Directory of static files served over HTTP (None = no static files)
    pub public_dir: Option<PathBuf>,
    /// Largest accepted WebSocket text frame
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            public_dir: None,
            max_message_bytes: crate::MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "duet", "duet")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognized variables:
    /// - `PORT`
    /// - `METERED_USERNAME` + `METERED_CREDENTIAL`
    /// - `TURN_SERVER` + `TURN_USERNAME`, optionally `TURN_CREDENTIAL`
    ///
    /// Credential pairs only take effect when both halves are present.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: port.clone(),
            })?;
        }

        if let (Some(username), Some(credential)) =
            (lookup("METERED_USERNAME"), lookup("METERED_CREDENTIAL"))
        {
            self.ice.metered = Some(MeteredCredentials {
                username,
                credential,
            });
        }

        if let (Some(url), Some(username)) = (lookup("TURN_SERVER"), lookup("TURN_USERNAME")) {
            self.ice.turn = Some(TurnServer {
                url,
                username,
                credential: lookup("TURN_CREDENTIAL"),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
