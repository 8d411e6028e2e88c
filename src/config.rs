//! # Configuration Management
//!
//! Centralized configuration for the client engine.
//!
//! This module provides the session-level knobs (port, socket options,
//! automatic handling) together with the protocol constants every component
//! shares: frame layout sizes and the well-known cipher keys.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (prefix `REALMGATE_`)
//!
//! Cipher keys are deliberately *not* part of [`ClientConfig`]: key material
//! is injected per session (see [`crate::utils::crypto::SessionKeys`]) so
//! sessions remain independently testable with synthetic keys.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Well-known port the game servers listen on
pub const GAME_PORT: u16 = 2050;

/// Bytes of frame header: u32 total length + u8 type tag
pub const FRAME_HEADER_LEN: usize = 5;

/// Max allowed frame size (1 MB); anything larger is protocol desync
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Length of the RC4 keys in bytes
pub const KEY_LEN: usize = 13;

/// Well-known keystream seed for client-to-server traffic
pub const CLIENT_KEY: [u8; KEY_LEN] = [
    0x6A, 0x39, 0x57, 0x0C, 0xC9, 0xDE, 0x4E, 0xC7, 0x1D, 0x91, 0xCC, 0x0D, 0xA3,
];

/// Well-known keystream seed for server-to-client traffic
pub const SERVER_KEY: [u8; KEY_LEN] = [
    0xC9, 0x1D, 0x9E, 0xEC, 0x42, 0x01, 0x60, 0x73, 0x0D, 0x82, 0x56, 0x04, 0xE0,
];

/// Client session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Port to connect to on the target host
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to set TCP_NODELAY on the connection
    #[serde(default = "default_true")]
    pub nodelay: bool,

    /// Whether protocol-mandated reactions (acks, registry maintenance)
    /// run without application involvement
    #[serde(default = "default_true")]
    pub automatic_handling: bool,
}

fn default_port() -> u16 {
    GAME_PORT
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: GAME_PORT,
            nodelay: true,
            automatic_handling: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(port) = std::env::var("REALMGATE_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.port = val;
            }
        }

        if let Ok(nodelay) = std::env::var("REALMGATE_NODELAY") {
            if let Ok(val) = nodelay.parse::<bool>() {
                config.nodelay = val;
            }
        }

        if let Ok(auto) = std::env::var("REALMGATE_AUTOMATIC_HANDLING") {
            if let Ok(val) = auto.parse::<bool>() {
                config.automatic_handling = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}
