//! Runtime configuration
//!
//! Defaults match the tank image; any field can be overridden through
//! `TANK_*` environment variables.

use crate::streamer::StreamerConfig;
use anyhow::{anyhow, Result};

/// Configuration for the pin daemon connection
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Loopback address of the pin daemon
    pub address: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:11700".into(),
        }
    }
}

/// Configuration for the whole control plane
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Listen address for interactive controllers
    pub control_address: String,
    /// Listen address for program uploads
    pub program_address: String,
    /// Pin daemon connection
    pub daemon: DaemonConfig,
    /// Start the streaming helper at boot
    pub streamer_enabled: bool,
    /// Streaming helper settings
    pub streamer: StreamerConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_address: "0.0.0.0:8080".into(),
            program_address: "127.0.0.1:8081".into(),
            daemon: DaemonConfig::default(),
            streamer_enabled: false,
            streamer: StreamerConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Defaults with overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("TANK_CONTROL_ADDR") {
            config.control_address = addr;
        }
        if let Some(addr) = lookup("TANK_PROGRAM_ADDR") {
            config.program_address = addr;
        }
        if let Some(addr) = lookup("TANK_DAEMON_ADDR") {
            config.daemon.address = addr;
        }
        if let Some(flag) = lookup("TANK_STREAMER") {
            config.streamer_enabled = parse_flag("TANK_STREAMER", &flag)?;
        }
        if let Some(res) = lookup("TANK_STREAMER_RES") {
            config.streamer.resolution = res;
        }
        if let Some(fps) = lookup("TANK_STREAMER_FPS") {
            config.streamer.framerate = fps
                .parse()
                .map_err(|_| anyhow!("TANK_STREAMER_FPS: invalid frame rate {:?}", fps))?;
        }
        if let Some(path) = lookup("TANK_STREAMER_PID_FILE") {
            config.streamer.pid_file = path.into();
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{}: expected a boolean, got {:?}", key, value)),
    }
}
