//! Agent configuration from environment variables

use crate::sink::BackendType;
use env_logger::{Builder, Env};
use std::env;
use std::time::Duration;

/// Log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logger reading `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
pub fn log_builder() -> Builder {
    log_builder_from(Env::default())
}

fn log_builder_from(env: Env<'_>) -> Builder {
    Builder::from_env(env.default_filter_or(DEFAULT_LOG_FILTER))
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// HTTP JSON-RPC endpoint
    pub rpc_url: String,

    pub poll_interval: Duration,

    /// First block to process; `None` starts at the current head
    pub start_block: Option<u64>,

    pub vault_window_minutes: u64,
    pub avg_block_time_secs: f64,
    pub vault_drift_threshold_pct: f64,

    /// Prefix joined with the transaction hash in narrative findings
    pub explorer_tx_url: String,

    pub findings_backend: BackendType,
    pub findings_path: String,
    pub snapshot_path: String,
}

impl AgentConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ETH_RPC_URL` (required, http:// or https://)
    /// - `POLL_INTERVAL_MS` (default: 4000)
    /// - `START_BLOCK` (default: current head)
    /// - `VAULT_WINDOW_MINUTES` (default: 15)
    /// - `AVG_BLOCK_TIME_SECS` (default: 13)
    /// - `VAULT_DRIFT_THRESHOLD_PCT` (default: 15)
    /// - `EXPLORER_TX_URL` (default: https://etherscan.io/tx/)
    /// - `FINDINGS_BACKEND` (default: jsonl)
    /// - `FINDINGS_PATH` (default: findings.jsonl)
    /// - `SNAPSHOT_PATH` (default: init_snapshot.json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = lookup("ETH_RPC_URL")
            .ok_or_else(|| ConfigError::MissingVariable("ETH_RPC_URL".to_string()))?;

        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "ETH_RPC_URL must start with http:// or https://".to_string(),
            ));
        }

        let poll_interval_ms: u64 = parse_or(&lookup, "POLL_INTERVAL_MS", 4_000)?;
        let start_block = match lookup("START_BLOCK") {
            Some(value) => Some(parse_value("START_BLOCK", &value)?),
            None => None,
        };

        let vault_window_minutes = parse_or(&lookup, "VAULT_WINDOW_MINUTES", 15)?;
        let avg_block_time_secs: f64 = parse_or(&lookup, "AVG_BLOCK_TIME_SECS", 13.0)?;
        if !avg_block_time_secs.is_finite() || avg_block_time_secs <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "AVG_BLOCK_TIME_SECS must be greater than 0, got {}",
                avg_block_time_secs
            )));
        }

        let vault_drift_threshold_pct: f64 = parse_or(&lookup, "VAULT_DRIFT_THRESHOLD_PCT", 15.0)?;
        if !vault_drift_threshold_pct.is_finite() || vault_drift_threshold_pct < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "VAULT_DRIFT_THRESHOLD_PCT must be a non-negative number, got {}",
                vault_drift_threshold_pct
            )));
        }

        let backend_str = lookup("FINDINGS_BACKEND").unwrap_or_else(|| "jsonl".to_string());
        let findings_backend = BackendType::from_str(&backend_str).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "FINDINGS_BACKEND must be 'jsonl' or 'log', got '{}'",
                backend_str
            ))
        })?;

        Ok(Self {
            rpc_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            start_block,
            vault_window_minutes,
            avg_block_time_secs,
            vault_drift_threshold_pct,
            explorer_tx_url: lookup("EXPLORER_TX_URL")
                .unwrap_or_else(|| "https://etherscan.io/tx/".to_string()),
            findings_backend,
            findings_path: lookup("FINDINGS_PATH").unwrap_or_else(|| "findings.jsonl".to_string()),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .unwrap_or_else(|| "init_snapshot.json".to_string()),
        })
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", name, value)))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}
