//! Server configuration
//!
//! Layered, lowest precedence first: built-in defaults, an optional JSON
//! file, `GOCHAT_*` environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use serde::Deserialize;

use crate::error::StartupError;
use crate::hub::HubSettings;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "GOCHAT_";

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "room_hub")]
#[command(version)]
#[command(about = "Multi-room WebSocket chat relay", long_about = None)]
pub struct Cli {
    /// Path of the server configuration JSON file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Address and port the server listens on
    #[arg(long)]
    pub listen_address: Option<String>,

    /// Include the file and line number with each log message
    #[arg(long, default_value = "false")]
    pub log_caller: bool,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface address and port to listen on
    pub listen_address: String,
    /// Default level for this crate's log events (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Include the file and line number with each log message
    pub log_caller: bool,
    /// Room created at startup
    pub default_room: String,
    pub default_room_capacity: usize,
    /// Per-member outbound mailbox size
    pub outbound_capacity: usize,
    /// Per-room command mailbox size
    pub mailbox_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let hub = HubSettings::default();
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_caller: false,
            default_room: "Global".to_string(),
            default_room_capacity: 50,
            outbound_capacity: hub.outbound_capacity,
            mailbox_capacity: hub.mailbox_capacity,
        }
    }
}

impl Config {
    /// Resolve the full configuration for this process
    pub fn load(cli: &Cli) -> Result<Self, StartupError> {
        let mut config = match &cli.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        Ok(config)
    }

    /// Read a JSON config file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, StartupError> {
        let data = std::fs::read_to_string(path).map_err(|source| StartupError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Apply `GOCHAT_*` overrides fetched through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("LISTEN_ADDRESS") {
            self.listen_address = value;
        }
        if let Some((_, value)) = var("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some((key, value)) = var("LOG_CALLER") {
            self.log_caller = parse_env(key, value)?;
        }
        if let Some((_, value)) = var("DEFAULT_ROOM") {
            self.default_room = value;
        }
        if let Some((key, value)) = var("DEFAULT_ROOM_CAPACITY") {
            self.default_room_capacity = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("OUTBOUND_CAPACITY") {
            self.outbound_capacity = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("MAILBOX_CAPACITY") {
            self.mailbox_capacity = parse_env(key, value)?;
        }
        Ok(())
    }

    /// Apply command-line flags
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(address) = &cli.listen_address {
            self.listen_address = address.clone();
        }
        if cli.log_caller {
            self.log_caller = true;
        }
    }

    /// Channel sizes for the hub
    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            mailbox_capacity: self.mailbox_capacity.max(1),
            outbound_capacity: self.outbound_capacity.max(1),
        }
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!("room_hub={}", self.log_level)
    }
}

fn parse_env<T: FromStr>(key: String, value: String) -> Result<T, StartupError> {
    value
        .trim()
        .parse()
        .map_err(|_| StartupError::InvalidEnv { key, value })
}
