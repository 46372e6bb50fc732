//! Configuration management for paylink.
//!
//! Loads configuration from ${PAYLINK_HOME}/config.toml with sensible defaults.
//! Secrets and redirect URLs may also come from the environment; see
//! [`resolve_value`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for the Telegram API.
    pub bot_token: Option<String>,
    /// Bot username (without `@`), used to match `/command@username`.
    pub bot_username: Option<String>,
    /// Override for the Bot API base URL.
    pub base_url: Option<String>,
}

/// Stripe Checkout configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub base_url: Option<String>,
    /// Timeout for checkout session requests in seconds (0 disables)
    pub request_timeout_secs: u64,
}

impl StripeConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Conversation session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle lifetime of a session in seconds.
    pub ttl_secs: u64,
    /// Background sweep interval in seconds (0 disables).
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Self::DEFAULT_TTL_SECS,
            sweep_interval_secs: 0,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: TelegramConfig,

    /// Stripe Checkout configuration
    pub stripe: StripeConfig,

    /// Session lifetime configuration
    pub session: SessionConfig,
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for paylink configuration.
    //!
    //! PAYLINK_HOME resolution order:
    //! 1. PAYLINK_HOME environment variable (if set)
    //! 2. ~/.config/paylink (default)

    use std::path::PathBuf;

    /// Returns the paylink home directory.
    pub fn paylink_home() -> PathBuf {
        if let Ok(home) = std::env::var("PAYLINK_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("paylink"))
            .unwrap_or_else(|| PathBuf::from(".paylink"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        paylink_home().join("config.toml")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Resolves a setting from the environment first, then the config file.
///
/// The first non-blank variable in `env_keys` wins. Values are trimmed and
/// blank values are treated as unset.
pub fn resolve_value(config_value: Option<&str>, env_keys: &[&str]) -> Option<String> {
    resolve_with(config_value, env_keys, |key| std::env::var(key).ok())
}

fn resolve_with(
    config_value: Option<&str>,
    env_keys: &[&str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_keys
        .iter()
        .find_map(|key| lookup(key).as_deref().and_then(normalize_string))
        .or_else(|| config_value.and_then(normalize_string))
}

fn normalize_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
