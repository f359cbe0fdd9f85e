use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::request::Args;
use crate::rotator::Dialect;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "ROTORLINK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node name, matched against `<rotor>` in UDP commands
    pub hostname: String,
    /// Address both listeners bind to (`LISTEN_ADDR` overrides)
    pub listen_addr: IpAddr,
    pub web_port: u16,
    /// Legacy serial pass-through port
    pub tcp_port: u16,
    pub content_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub serial: SerialConfig,
    pub n1mm: N1mmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub dialect: Dialect,
}

/// UDP rotor integration (N1MM Logger compatible).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct N1mmConfig {
    pub enabled: bool,
    pub ip_address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Port we listen on for rotor commands
    pub receive_port: u16,
    /// Port our position broadcasts go to
    pub broadcast_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter out of range: {0}")]
    OutOfRange(&'static str),
    #[error("failed to encode configuration: {0}")]
    Encode(#[from] serde_yaml::Error),
    #[error("failed to write configuration: {0}")]
    Write(#[from] std::io::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "rotator".to_string(),
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            web_port: 80,
            tcp_port: 73,
            content_dir: PathBuf::from("content"),
            max_upload_bytes: 1024 * 1024,
            serial: SerialConfig::default(),
            n1mm: N1mmConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: crate::rotator::driver::BAUD_RATE,
            dialect: Dialect::Combined,
        }
    }
}

impl Default for N1mmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ip_address: Ipv4Addr::new(192, 168, 1, 73),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            receive_port: 12040,
            broadcast_port: 13010,
        }
    }
}

impl Config {
    /// Path of the configuration file, from `ROTORLINK_CONFIG` or the default.
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Loads the configuration named by the environment, then applies `LISTEN_ADDR`.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::path_from_env())?;

        if let Ok(listen) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = listen
                .parse()
                .with_context(|| format!("Invalid LISTEN_ADDR address: {}", listen))?;
        }

        Ok(config)
    }

    /// Reads a YAML file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid configuration: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Applies the recognised settings in `args`.
    ///
    /// All values are validated before anything is changed; on error `self`
    /// is untouched. Returns whether any setting was present.
    pub fn apply_updates(&mut self, args: &Args) -> Result<bool, ConfigError> {
        let mut updated = self.clone();
        let mut dirty = false;

        if let Some(value) = args.get("web_port") {
            updated.web_port = parse_port(value, "web_port")?;
            dirty = true;
        }
        if let Some(value) = args.get("tcp_port") {
            updated.tcp_port = parse_port(value, "tcp_port")?;
            dirty = true;
        }
        if let Some(value) = args.get("hostname") {
            let value = value.trim();
            if value.is_empty() || value.len() > 63 {
                return Err(ConfigError::OutOfRange("hostname"));
            }
            updated.hostname = value.to_string();
            dirty = true;
        }
        if let Some(value) = args.get("n1mm") {
            updated.n1mm.enabled = parse_flag(value).ok_or(ConfigError::OutOfRange("n1mm"))?;
            dirty = true;
        }
        if let Some(value) = args.get("dialect") {
            updated.serial.dialect =
                Dialect::from_name(value).ok_or(ConfigError::OutOfRange("dialect"))?;
            dirty = true;
        }
        if let Some(value) = args.get("ip_address") {
            updated.n1mm.ip_address = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::OutOfRange("ip_address"))?;
            dirty = true;
        }
        if let Some(value) = args.get("netmask") {
            updated.n1mm.netmask = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::OutOfRange("netmask"))?;
            dirty = true;
        }

        *self = updated;
        Ok(dirty)
    }
}

fn parse_port(value: &str, field: &'static str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::OutOfRange(field))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}
