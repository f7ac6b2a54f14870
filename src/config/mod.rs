//! # Configuration Management
//!
//! TOML configuration for the proxy, organized into small sections:
//!
//! - [`ProxyConfig`] - listening address and the optional raw dump file
//! - [`UpstreamConfig`] - the game server to connect to
//! - [`ColorConfig`] - color strategy and optional tag renderings
//! - [`StorageConfig`] - where the map store lives
//! - [`LoggingConfig`] - level and optional log file
//!
//! All values have working defaults (`batproxy init` writes them out), and
//! everything loaded from disk passes through [`Config::validate`]. CLI
//! arguments override the file where the binary exposes them.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::proto::color::ColorMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on; loopback by default so only local clients can
    /// ride the session.
    pub listen_host: String,
    pub listen_port: u16,
    /// Append every raw server-side byte to this file (protocol debugging).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    /// `direct` for 24-bit sequences, `xterm256` for indexed ones.
    #[serde(default)]
    pub mode: ColorMode,
    /// Render tag 50 (full hp/sp/ep status) as a marker line instead of
    /// dropping it.
    #[serde(default)]
    pub full_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub color: ColorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            mode: ColorMode::default(),
            full_status: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            proxy: ProxyConfig {
                listen_host: "::1".to_string(),
                listen_port: 2023,
                dump_file: None,
            },
            upstream: UpstreamConfig {
                host: "batmud.bat.org".to_string(),
                port: 2022,
            },
            color: ColorConfig::default(),
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
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
        if self.proxy.listen_port == 0 {
            return Err(anyhow!("proxy.listen_port must be non-zero"));
        }
        if self.upstream.host.is_empty() {
            return Err(anyhow!("upstream.host must not be empty"));
        }
        if self.upstream.port == 0 {
            return Err(anyhow!("upstream.port must be non-zero"));
        }
        if self.storage.data_dir.is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "logging.level must be one of {:?}, got {:?}",
                LEVELS,
                self.logging.level
            ));
        }
        Ok(())
    }
}
