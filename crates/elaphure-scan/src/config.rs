//! Configuration loading

use anyhow::Result;
use elaphure_discovery::probe::{DEFAULT_SCAN_TIMEOUT, DEFAULT_SUB_TIMEOUT};
use elaphure_discovery::{ScannerConfig, DISCOVERY_PORT};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// UDP port devices listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overall scan window in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Longest single receive wait in milliseconds
    #[serde(default = "default_sub_timeout_ms")]
    pub sub_timeout_ms: u64,
    /// Local address to bind the probe socket to
    #[serde(default = "default_bind")]
    pub bind: Ipv4Addr,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            sub_timeout_ms: default_sub_timeout_ms(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    DISCOVERY_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SCAN_TIMEOUT.as_millis() as u64
}

fn default_sub_timeout_ms() -> u64 {
    DEFAULT_SUB_TIMEOUT.as_millis() as u64
}

fn default_bind() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            port: self.discovery.port,
            bind_addr: self.discovery.bind,
            sub_timeout_ms: self.discovery.sub_timeout_ms,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.discovery.port, 50000);
        assert_eq!(config.discovery.timeout_ms, 800);
        assert_eq!(config.discovery.sub_timeout_ms, 120);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elaphure.toml");
        std::fs::write(
            &path,
            "[discovery]\ntimeout_ms = 1500\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.discovery.timeout_ms, 1500);
        assert_eq!(config.discovery.port, 50000);
        assert_eq!(config.discovery.bind, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elaphure.toml");
        std::fs::write(&path, "[discovery]\nport = \"not a port\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_saved_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elaphure.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        let scanner = config.to_scanner_config();
        assert_eq!(scanner.port, 50000);
        assert_eq!(scanner.sub_timeout_ms, 120);
    }
}
