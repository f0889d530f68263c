//! Configuration management for the txlander relayer
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::rpc::Commitment;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub relayer: RelayerConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    pub instance_id: String,
    pub max_concurrent_submissions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    /// Derived from `http_url` when absent
    pub ws_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Tuning for the submit-and-confirm protocol
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubmissionConfig {
    pub resend_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub expiry_margin_blocks: u64,
    pub commitment: Commitment,
    pub simulate_before_submit: bool,
}

impl SubmissionConfig {
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            resend_interval_ms: 2_000,
            poll_interval_ms: 2_000,
            expiry_margin_blocks: crate::tx::DEFAULT_EXPIRY_MARGIN_BLOCKS,
            commitment: Commitment::Confirmed,
            simulate_before_submit: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

fn default_explorer_url() -> String {
    "https://solscan.io/tx".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from the file named by `TXLANDER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("TXLANDER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.rpc.http_url.is_empty() {
            anyhow::bail!("rpc.http_url must be set");
        }
        if self.rpc.request_timeout_ms == 0 {
            anyhow::bail!("rpc.request_timeout_ms must be greater than zero");
        }
        if self.relayer.max_concurrent_submissions == 0 {
            anyhow::bail!("relayer.max_concurrent_submissions must be greater than zero");
        }

        let submission = &self.submission;
        if submission.resend_interval_ms == 0 || submission.poll_interval_ms == 0 {
            anyhow::bail!("submission intervals must be greater than zero");
        }
        if submission.commitment == Commitment::Processed {
            tracing::warn!("Confirming at 'processed' commitment - outcomes may be rolled back");
        }

        Ok(())
    }
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
