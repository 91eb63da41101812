//! Agent configuration
//!
//! Handles:
//! - Engine settings (period, refresh timeout, watched pairs and limits)
//! - Alert presentation (terminal bell, external command)
//! - Console summary cadence
//! - OS-specific storage, overridable by `HWMON_CONFIG` or `--config`

use anyhow::{Context, Result};
use hwmon_engine::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "HWMON_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub engine: MonitorConfig,
    pub alert: AlertConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Ring the terminal bell on breach
    pub bell: bool,
    /// How long one cue is considered to be playing
    pub cue_ms: u64,
    /// Command run on breach, split with shell quoting rules
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Console summary cadence, 0 disables the summary
    pub summary_every_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            bell: true,
            cue_ms: 500,
            command: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { summary_every_ms: 5000 }
    }
}

impl AlertConfig {
    pub fn cue(&self) -> Duration {
        Duration::from_millis(self.cue_ms)
    }
}

impl DisplayConfig {
    pub fn summary_every(&self) -> Duration {
        Duration::from_millis(self.summary_every_ms)
    }
}

impl AgentConfig {
    /// Load config from `path`, `HWMON_CONFIG` or the OS-specific location, in that order
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path)?;

        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml_str(&content).with_context(|| format!("Invalid configuration in {}", config_path.display()))
        } else {
            debug!("No configuration at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(content).context("Failed to parse configuration")?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Save config to `path`, `HWMON_CONFIG` or the OS-specific location
    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = Self::resolve_path(path)?;

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        tokio::fs::write(&config_path, content)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(config_path)
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = path {
            return Ok(path.to_path_buf());
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Self::config_file_path(),
        }
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("hwmon-agent");
        path.push("config.toml");
        Ok(path)
    }
}
