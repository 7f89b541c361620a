//! Daemon configuration
//!
//! Settings come from three layers, highest priority first: command line
//! flags, an optional TOML file (`--config`) and built-in defaults.
//!
//! ```toml
//! [peripheral]
//! role = "collector"
//! adapter = "hci0"
//! alias = "iotsc-hub"
//! device_id = "hub-%IP"
//! auto_advertise = true
//!
//! [status]
//! bind = "127.0.0.1:6459"
//! path = "/RPC2"
//!
//! [log]
//! file = "/var/log/dtniotsc.log"
//! verbosity = 1
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use iotsc_core::Role;
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, Commands};
use crate::error::{DaemonError, Result};

/// Default port of the status endpoint
pub const DEFAULT_STATUS_PORT: u16 = 6459;

// ----------------------------------------------------------------------------
// Configuration Sections
// ----------------------------------------------------------------------------

/// Complete configuration of the daemon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub peripheral: PeripheralConfig,
    pub status: StatusConfig,
    pub log: LogConfig,
}

/// BLE peripheral settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    pub role: Role,

    /// Adapter name; the default adapter when unset
    pub adapter: Option<String>,

    /// Name the adapter advertises
    pub alias: String,

    /// Device identifier; `%IP` is replaced with the current IP address
    pub device_id: String,

    /// Stop advertising while a peer is connected
    pub auto_advertise: bool,

    /// How often a rejected advertising command re-enters the peripheral loop
    pub advertising_retries: u32,

    /// Pause before re-entering the peripheral loop (in milliseconds)
    pub retry_delay_ms: u64,
}

/// Loopback status endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub bind: SocketAddr,
    pub path: String,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Truncated at startup
    pub file: PathBuf,

    /// 0 = warnings, 1 = info, 2 or more = debug
    pub verbosity: u8,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            role: Role::Sender,
            adapter: None,
            alias: String::new(),
            device_id: String::new(),
            auto_advertise: false,
            advertising_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_STATUS_PORT)),
            path: "/RPC2".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("log.txt"),
            verbosity: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl DaemonConfig {
    /// Load the configuration for `cli` and validate it for its subcommand
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);

        match cli.command {
            Commands::Start(_) => config.validate()?,
            Commands::Status => config.validate_status()?,
        }
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DaemonError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Override file and default values with the flags given on the command line
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(collector) = cli.collector {
            self.peripheral.role = if collector {
                Role::Collector
            } else {
                Role::Sender
            };
        }
        if let Some(adapter) = &cli.bluetooth {
            self.peripheral.adapter = Some(adapter.clone());
        }

        if let Commands::Start(args) = &cli.command {
            if let Some(device_id) = &args.device_id {
                self.peripheral.device_id = device_id.clone();
            }
            if let Some(alias) = &args.alias {
                self.peripheral.alias = alias.clone();
            }
            if args.auto_advertise {
                self.peripheral.auto_advertise = true;
            }
            if args.verbose > 0 {
                self.log.verbosity = args.verbose;
            }
            if let Some(file) = &args.log_file {
                self.log.file = file.clone();
            }
        }
    }

    /// Validate everything needed to start the peripheral
    pub fn validate(&self) -> Result<()> {
        if self.peripheral.alias.trim().is_empty() {
            return Err(DaemonError::Config(
                "Bluetooth alias must be given (--alias or peripheral.alias)".to_string(),
            ));
        }
        if self.peripheral.device_id.trim().is_empty() {
            return Err(DaemonError::Config(
                "Device id must be given (--deviceid or peripheral.device_id)".to_string(),
            ));
        }
        if matches!(&self.peripheral.adapter, Some(adapter) if adapter.is_empty()) {
            return Err(DaemonError::Config(
                "Bluetooth adapter name must not be empty".to_string(),
            ));
        }
        self.validate_status()
    }

    /// Validate the status endpoint settings alone
    pub fn validate_status(&self) -> Result<()> {
        if !self.status.bind.ip().is_loopback() {
            return Err(DaemonError::Config(format!(
                "Status endpoint must bind to a loopback address, got {}",
                self.status.bind
            )));
        }
        if !self.status.path.starts_with('/') {
            return Err(DaemonError::Config(format!(
                "Status path must start with '/', got '{}'",
                self.status.path
            )));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.peripheral.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.peripheral.alias = "iotsc".to_string();
        config.peripheral.device_id = "node-17".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.peripheral.role, Role::Sender);
        assert!(!config.peripheral.auto_advertise);
        assert_eq!(config.status.bind.to_string(), "127.0.0.1:6459");
        assert_eq!(config.status.path, "/RPC2");
        assert_eq!(config.log.file, PathBuf::from("log.txt"));
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_validate_requires_identity() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.peripheral.alias.clear();
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));

        let mut config = valid_config();
        config.peripheral.device_id = "  ".to_string();
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_public_bind() {
        let mut config = valid_config();
        config.status.bind = "0.0.0.0:6459".parse().unwrap();
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));

        config.status.bind = "[::1]:6459".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_status_path() {
        let mut config = valid_config();
        config.status.path = "RPC2".to_string();
        assert!(config.validate_status().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [peripheral]
            role = "collector"
            alias = "hub"
            "#,
        )
        .unwrap();
        assert_eq!(config.peripheral.role, Role::Collector);
        assert_eq!(config.peripheral.alias, "hub");
        assert_eq!(config.peripheral.advertising_retries, 3);
        assert_eq!(config.status, StatusConfig::default());
    }
}
