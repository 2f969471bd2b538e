//! Configuration management for MIGOP.
//!
//! Handles loading and saving configuration from TOML files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote call policy
    pub gateway: GatewayConfig,

    /// Cooperative slicing of per-item work
    pub chunking: ChunkConfig,

    /// Clipboard behaviour at pause points
    pub clipboard: ClipboardConfig,

    /// Committee key to display name
    #[serde(default)]
    pub committees: BTreeMap<String, String>,
}

/// Timeouts and retry policy for Document Gateway calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bounded wait for the document export
    pub export_timeout_secs: u64,

    /// Bounded wait for the document replacement
    pub replace_timeout_secs: u64,

    /// Bounded wait for the version counter lookup
    pub counter_timeout_secs: u64,

    /// Bounded wait for the version-history write
    pub history_timeout_secs: u64,

    /// Automatic retry of failed calls (off unless configured)
    pub retry: RetrySettings,
}

/// Serializable form of [`RetryConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of retry attempts (0 = fail fast)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between retries
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub jitter: bool,
}

/// Slice limits for chunked processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Items processed before yielding
    pub max_items_per_slice: usize,

    /// Wall-clock budget per slice, in milliseconds
    pub max_millis_per_slice: u64,

    /// Report progress every N items
    pub progress_every: usize,
}

/// Clipboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Copy version identifiers at pause points
    pub enabled: bool,
}

impl GatewayConfig {
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }

    pub fn replace_timeout(&self) -> Duration {
        Duration::from_secs(self.replace_timeout_secs)
    }

    pub fn counter_timeout(&self) -> Duration {
        Duration::from_secs(self.counter_timeout_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }
}

impl RetrySettings {
    /// Build the runtime retry configuration.
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }
}

impl ChunkConfig {
    /// Per-slice wall-clock budget.
    pub fn slice_budget(&self) -> Duration {
        Duration::from_millis(self.max_millis_per_slice)
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// Searches in order:
    /// 1. `.migop.toml` in current directory
    /// 2. `~/.config/migop/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".migop.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir =
            Self::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("migop"))
    }

    /// Path of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Resolve a committee key to its display name.
    ///
    /// Unknown keys are shown as entered.
    pub fn committee_display_name(&self, key: &str) -> String {
        let key = key.trim();
        self.committees.get(key).cloned().unwrap_or_else(|| key.to_string())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            export_timeout_secs: 30,
            replace_timeout_secs: 60,
            counter_timeout_secs: 30,
            history_timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let fail_fast = RetryConfig::no_retry();
        Self {
            max_attempts: fail_fast.max_attempts,
            initial_delay_ms: fail_fast.initial_delay.as_millis() as u64,
            max_delay_ms: fail_fast.max_delay.as_millis() as u64,
            backoff_multiplier: fail_fast.backoff_multiplier,
            jitter: fail_fast.jitter,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_items_per_slice: 10, max_millis_per_slice: 50, progress_every: 5 }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
