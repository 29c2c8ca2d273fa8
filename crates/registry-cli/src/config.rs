//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use profile_registry::RegistryConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ledger gateway configuration
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Signing key configuration
    #[serde(default)]
    pub signer: SignerConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Ledger gateway base URL
    #[serde(default = "default_ledger_url")]
    pub url: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignerConfig {
    /// Hex ed25519 seed; a throwaway key is generated when unset
    pub key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_ledger_url() -> String {
    "http://localhost:8600".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_log_level() -> String {
    "warn".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Keys and addresses stay strings even when they look numeric
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
