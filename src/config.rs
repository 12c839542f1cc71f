//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::packets::SyncAllModels;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name sent to clients in the welcome
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address to bind listeners on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port for native clients
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket port for browser/bridge clients (0 to disable)
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Maximum number of concurrent connections
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Largest accepted frame payload in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Per-session outbound queue capacity (frames)
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,

    /// Seconds a new connection has to send its hello
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Whether the model sync channels are advertised and served
    #[serde(default = "default_true")]
    pub model_sync_enabled: bool,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_server_name() -> String {
    "CottFur".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    25590
}

fn default_websocket_port() -> u16 {
    25591
}

fn default_max_players() -> u32 {
    500
}

fn default_max_frame_size() -> usize {
    1 << 20
}

fn default_outbound_queue_size() -> usize {
    256
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            websocket_port: default_websocket_port(),
            max_players: default_max_players(),
            max_frame_size: default_max_frame_size(),
            outbound_queue_size: default_outbound_queue_size(),
            handshake_timeout_secs: default_handshake_timeout(),
            model_sync_enabled: default_true(),
            debug: false,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("COTTFUR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        config.apply_overrides(|key| env::var(key).ok());

        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `COTTFUR_*` overrides from a variable lookup
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("COTTFUR_SERVER_NAME") {
            self.server_name = val;
        }
        if let Some(val) = lookup("COTTFUR_BIND_ADDRESS") {
            self.bind_address = val;
        }
        if let Some(port) = lookup("COTTFUR_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(port) = lookup("COTTFUR_WEBSOCKET_PORT").and_then(|v| v.parse().ok()) {
            self.websocket_port = port;
        }
        if let Some(max) = lookup("COTTFUR_MAX_PLAYERS").and_then(|v| v.parse().ok()) {
            self.max_players = max;
        }
        if let Some(size) = lookup("COTTFUR_MAX_FRAME_SIZE").and_then(|v| v.parse().ok()) {
            self.max_frame_size = size;
        }
        if let Some(size) = lookup("COTTFUR_OUTBOUND_QUEUE_SIZE").and_then(|v| v.parse().ok()) {
            self.outbound_queue_size = size;
        }
        if let Some(secs) = lookup("COTTFUR_HANDSHAKE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.handshake_timeout_secs = secs;
        }
        if let Some(val) = lookup("COTTFUR_MODEL_SYNC_ENABLED") {
            self.model_sync_enabled = parse_flag(&val);
        }
        if let Some(val) = lookup("COTTFUR_DEBUG") {
            self.debug = parse_flag(&val);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port must be non-zero");
        }

        if self.websocket_port != 0 && self.port == self.websocket_port {
            anyhow::bail!("TCP port and WebSocket port must be different");
        }

        if self.max_players == 0 || self.max_players > 10000 {
            anyhow::bail!("Max players must be between 1 and 10000");
        }

        if self.max_frame_size < 1024 {
            anyhow::bail!("Max frame size must be at least 1024 bytes");
        }

        // The join snapshot holds at most one entry per player
        let snapshot_len = SyncAllModels::max_encoded_len(self.max_players as usize);
        if snapshot_len > self.max_frame_size {
            anyhow::bail!(
                "Max frame size {} cannot hold a snapshot of {} players ({} bytes)",
                self.max_frame_size,
                self.max_players,
                snapshot_len
            );
        }

        if self.outbound_queue_size == 0 {
            anyhow::bail!("Outbound queue size must be at least 1");
        }

        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("Handshake timeout must be at least 1 second");
        }

        Ok(())
    }

    /// Whether the WebSocket listener should run
    pub fn websocket_enabled(&self) -> bool {
        self.websocket_port != 0
    }

    /// TCP listen address
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// WebSocket listen address
    pub fn websocket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.websocket_port)
    }

    /// Handshake timeout as a duration
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
