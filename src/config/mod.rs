//! # Configuration Management Module
//!
//! Mountlink reads a single TOML file. Every section is optional and falls back to
//! defaults that match a stock 10micron mount on its factory port.
//!
//! ## Configuration Structure
//!
//! - [`MountConfig`] - address of the mount computer and its MAC for Wake-on-LAN
//! - [`TimingConfig`] - socket deadlines and the post-flip settle delay
//! - [`CycleConfig`] - poll period of each subsystem
//! - [`PoolConfig`] - size of the shared worker pool
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mountlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("mountlink.toml").await?;
//!     let config = Config::load("mountlink.toml").await?;
//!     println!("Mount: {:?}:{}", config.mount.host, config.mount.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [mount]
//! host = "192.168.2.15"
//! port = 3492
//! mac = "00:c0:08:87:35:db"
//!
//! [cycles]
//! pointing_ms = 500
//! setting_ms = 3100
//!
//! [logging]
//! level = "debug"
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::mount::{CyclePeriods, MountOptions};
use crate::transport::{Timeouts, DEFAULT_PORT};
use crate::worker::DEFAULT_WORKERS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
    /// Needed for `boot` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            mac: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub connect_timeout_ms: u64,
    pub receive_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    /// Wait after a meridian flip before reporting the slew finished
    pub settle_flip_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            receive_timeout_ms: 2000,
            probe_timeout_ms: 2000,
            settle_flip_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub pointing_ms: u64,
    pub dome_ms: u64,
    pub clock_ms: u64,
    pub reachability_ms: u64,
    pub setting_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            pointing_ms: 500,
            dome_ms: 950,
            clock_ms: 1000,
            reachability_ms: 2700,
            setting_ms: 3100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mount: MountConfig,
    pub timing: TimingConfig,
    pub cycles: CycleConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mount.port == 0 {
            return Err(anyhow!("mount.port must not be 0"));
        }
        let periods = [
            ("pointing_ms", self.cycles.pointing_ms),
            ("dome_ms", self.cycles.dome_ms),
            ("clock_ms", self.cycles.clock_ms),
            ("reachability_ms", self.cycles.reachability_ms),
            ("setting_ms", self.cycles.setting_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(anyhow!("cycles.{} must be greater than 0", name));
        }
        if self.pool.workers == 0 {
            return Err(anyhow!("pool.workers must be greater than 0"));
        }
        Ok(())
    }

    pub fn mount_options(&self) -> MountOptions {
        let ms = Duration::from_millis;
        MountOptions {
            host: self.mount.host.clone(),
            port: self.mount.port,
            mac: self.mount.mac.clone(),
            timeouts: Timeouts {
                connect: ms(self.timing.connect_timeout_ms),
                receive: ms(self.timing.receive_timeout_ms),
            },
            probe_timeout: ms(self.timing.probe_timeout_ms),
            settle_flip: Duration::from_secs(self.timing.settle_flip_seconds),
            periods: CyclePeriods {
                pointing: ms(self.cycles.pointing_ms),
                dome: ms(self.cycles.dome_ms),
                clock: ms(self.cycles.clock_ms),
                reachability: ms(self.cycles.reachability_ms),
                setting: ms(self.cycles.setting_ms),
            },
            workers: self.pool.workers,
        }
    }
}
