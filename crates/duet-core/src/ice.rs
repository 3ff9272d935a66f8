//! ICE server discovery
//!
//! Browsers fetch the list built here before creating their peer connection.
//! STUN entries are always present; TURN relays are added only when
//! credentials have been configured.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Metered.ca TURN relay hosts, tried in this order by browsers
pub const METERED_TURN_URLS: [&str; 3] = [
    "turn:a.relay.metered.ca:80",
    "turn:a.relay.metered.ca:80?transport=tcp",
    "turn:a.relay.metered.ca:443",
];

/// Public STUN servers used when none are configured
pub const DEFAULT_STUN_URLS: [&str; 3] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
];

/// ICE settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IceConfig {
    /// STUN server URLs
    pub stun_urls: Vec<String>,
    /// Metered.ca relay credentials (preferred when set)
    pub metered: Option<MeteredCredentials>,
    /// Self-hosted TURN relay
    pub turn: Option<TurnServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_urls: DEFAULT_STUN_URLS.iter().map(|s| s.to_string()).collect(),
            metered: None,
            turn: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeteredCredentials {
    pub username: String,
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: Option<String>,
}

/// One entry of `RTCConfiguration.iceServers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServer {
    pub urls: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: url.into(),
            username: None,
            credential: None,
        }
    }

    pub fn turn(url: impl Into<String>, username: &str, credential: Option<&str>) -> Self {
        Self {
            urls: url.into(),
            username: Some(username.to_string()),
            credential: credential.map(str::to_string),
        }
    }
}

/// Body of `GET /api/ice-servers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerList {
    #[serde(rename = "iceServers")]
    pub ice_servers: Vec<IceServer>,
}

/// Which relay source ended up in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySource {
    Metered,
    Custom,
    None,
}

impl IceConfig {
    /// Relay source that [`IceConfig::ice_servers`] will use
    pub fn relay_source(&self) -> RelaySource {
        if self.metered.is_some() {
            RelaySource::Metered
        } else if self.turn.is_some() {
            RelaySource::Custom
        } else {
            RelaySource::None
        }
    }

    /// Build the ICE server list handed to clients
    pub fn ice_servers(&self) -> IceServerList {
        let mut ice_servers: Vec<IceServer> = self
            .stun_urls
            .iter()
            .map(|url| IceServer::stun(url.as_str()))
            .collect();

        if let Some(metered) = &self.metered {
            ice_servers.extend(METERED_TURN_URLS.iter().map(|url| {
                IceServer::turn(*url, &metered.username, Some(&metered.credential))
            }));
        } else if let Some(turn) = &self.turn {
            ice_servers.push(IceServer::turn(
                turn.url.as_str(),
                &turn.username,
                turn.credential.as_deref(),
            ));
        }

        IceServerList { ice_servers }
    }

    /// Log which relay configuration is active
    pub fn log_summary(&self) {
        match self.relay_source() {
            RelaySource::Metered => info!("TURN servers configured (Metered.ca)"),
            RelaySource::Custom => info!("TURN server configured (custom)"),
            RelaySource::None => {
                warn!("No TURN servers configured - connections may fail behind strict NAT")
            }
        }
    }
}
