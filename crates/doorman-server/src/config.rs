//! Gateway configuration.
//!
//! Values are resolved in three layers, later layers winning:
//!
//! 1. Built-in defaults ([`ServerConfig::default`])
//! 2. A TOML file named by `DOORMAN_CONFIG`
//! 3. Individual environment variables (`DOORMAN_HOST`, `DOORMAN_PORT`,
//!    `DOORMAN_ADMIN_USER_ID`, `DOORMAN_LOG_LEVEL`)
//!
//! # Example file
//!
//! ```toml
//! port = 8080
//! admin_user_id = "supervisor"
//!
//! [throttle]
//! max_failed_attempts = 3
//!
//! [heartbeat]
//! timeout_secs = 45
//!
//! [[doors]]
//! door_id = "DOOR-001"
//! location = "Main Entrance"
//! device_type = "physical"
//! lock_state = "locked"
//! ```

use doorman_access::ThrottleConfig;
use doorman_core::constants::DEFAULT_ADMIN_USER_ID;
use doorman_core::{DeviceType, Door, DoorId, LockState, PhysicalStatus};
use doorman_network::HeartbeatConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "DOORMAN_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid door seed: {0}")]
    InvalidDoor(String),

    #[error("Invalid bind address {host}:{port}")]
    InvalidBindAddr { host: String, port: u16 },

    #[error("admin_user_id must not be empty")]
    EmptyAdmin,
}

/// A door created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSeed {
    pub door_id: String,
    pub location: String,
    #[serde(default = "default_device_type")]
    pub device_type: DeviceType,
    #[serde(default = "default_physical_status")]
    pub physical_status: PhysicalStatus,
    #[serde(default = "default_lock_state")]
    pub lock_state: LockState,
}

fn default_device_type() -> DeviceType {
    DeviceType::Virtual
}

fn default_physical_status() -> PhysicalStatus {
    PhysicalStatus::Closed
}

fn default_lock_state() -> LockState {
    LockState::Unlocked
}

impl DoorSeed {
    fn new(door_id: &str, location: &str, device_type: DeviceType, lock_state: LockState) -> Self {
        Self {
            door_id: door_id.to_string(),
            location: location.to_string(),
            device_type,
            physical_status: PhysicalStatus::Closed,
            lock_state,
        }
    }

    fn to_door(&self) -> Result<Door, ConfigError> {
        let id = DoorId::new(&self.door_id).map_err(|e| ConfigError::InvalidDoor(e.to_string()))?;
        Ok(Door::new(id, self.location.clone(), self.device_type)
            .with_physical_status(self.physical_status)
            .with_lock_state(self.lock_state))
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Caller id granted admin rights (compared case-insensitively).
    pub admin_user_id: String,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// CORS origins. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    pub throttle: ThrottleConfig,
    pub heartbeat: HeartbeatConfig,
    pub doors: Vec<DoorSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            admin_user_id: DEFAULT_ADMIN_USER_ID.to_string(),
            log_level: "info".to_string(),
            allowed_origins: vec!["*".to_string()],
            throttle: ThrottleConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            doors: vec![
                DoorSeed::new("DOOR-001", "Main Entrance", DeviceType::Physical, LockState::Locked),
                DoorSeed::new("DOOR-002", "Conference Room A", DeviceType::Virtual, LockState::Unlocked),
            ],
        }
    }
}

impl ServerConfig {
    /// Load from the file named by `DOORMAN_CONFIG` (if set) and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown enum
    /// values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `DOORMAN_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `DOORMAN_PORT` is not a port.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("DOORMAN_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DOORMAN_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "DOORMAN_PORT",
                value: port,
            })?;
        }
        if let Some(admin) = lookup("DOORMAN_ADMIN_USER_ID") {
            self.admin_user_id = admin;
        }
        if let Some(level) = lookup("DOORMAN_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAdmin`] or [`ConfigError::InvalidDoor`]
    /// for an invalid or duplicated door id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_user_id.trim().is_empty() {
            return Err(ConfigError::EmptyAdmin);
        }
        self.seed_doors().map(|_| ())
    }

    /// Door records to seed the registry with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDoor`] for an invalid or duplicated id.
    pub fn seed_doors(&self) -> Result<Vec<Door>, ConfigError> {
        let mut seen = HashSet::new();
        self.doors
            .iter()
            .map(|seed| {
                let door = seed.to_door()?;
                if !seen.insert(door.door_id.clone()) {
                    return Err(ConfigError::InvalidDoor(format!(
                        "duplicate door id {}",
                        door.door_id
                    )));
                }
                Ok(door)
            })
            .collect()
    }

    /// Socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddr`] if `host` is not an IP
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidBindAddr {
            host: self.host.clone(),
            port: self.port,
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
