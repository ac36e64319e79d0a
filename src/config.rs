//! Configuration management for Tally GW
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section is optional; missing values fall back to the wiring of the
//! reference relay board (8 relays on BCM 17, 18, 27, 22, 23, 24, 25, 4).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::sysex::CHANNEL_COUNT;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub outputs: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Switcher identification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Substring matched (case-sensitive) against MIDI endpoint names
    #[serde(default = "default_token")]
    pub token: String,
    /// Client name registered with the MIDI subsystem
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Polling cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Delay between reconnect attempts while the device is absent
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Output backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    Gpio,
    Console,
}

/// Lamp output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_backend")]
    pub backend: OutputBackend,
    /// Lamps light on a low level
    #[serde(default = "default_true")]
    pub active_low: bool,
    /// GPIO numbers, one per channel in channel order
    #[serde(default = "default_pins")]
    pub pins: Vec<u32>,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

/// Log file configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            token: default_token(),
            client_name: default_client_name(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            active_low: default_true(),
            pins: default_pins(),
            gpio_root: default_gpio_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.token.is_empty() {
            anyhow::bail!("device.token cannot be empty");
        }
        if self.device.client_name.is_empty() {
            anyhow::bail!("device.client_name cannot be empty");
        }

        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than 0");
        }
        if self.polling.reconnect_interval_ms < self.polling.interval_ms {
            anyhow::bail!(
                "polling.reconnect_interval_ms ({}) must not be shorter than polling.interval_ms ({})",
                self.polling.reconnect_interval_ms,
                self.polling.interval_ms
            );
        }

        if self.outputs.pins.len() != CHANNEL_COUNT {
            anyhow::bail!(
                "outputs.pins must list exactly {} pins (got {})",
                CHANNEL_COUNT,
                self.outputs.pins.len()
            );
        }
        let mut seen = HashSet::new();
        for pin in &self.outputs.pins {
            if !seen.insert(pin) {
                anyhow::bail!("outputs.pins lists GPIO {} more than once", pin);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_token() -> String { "V-8HD".to_string() }
fn default_client_name() -> String { "tally-gw".to_string() }
fn default_interval_ms() -> u64 { 50 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_backend() -> OutputBackend { OutputBackend::Gpio }
fn default_true() -> bool { true }
fn default_pins() -> Vec<u32> { vec![17, 18, 27, 22, 23, 24, 25, 4] }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
