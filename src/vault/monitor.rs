//! Vault Drift Monitor - periodic balance sampling of custodial vaults
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize(block)--> Sampled
//!                                         |
//!     on_block(b), b % window == 0, b > sample.block
//!                                         |
//!           read all → compare → emit → replace sample
//! ```

use super::balance::{BalanceError, BalanceProvider};
use crate::findings::{Finding, ALERT_VAULT_BALANCE_CHANGE};
use crate::registry::VaultSpec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const POOL_BLOCK_WINDOW_KEY: &str = "poolBlockWindow";

#[derive(Debug)]
pub enum VaultError {
    NotInitialized,
    Balance { vault: String, source: BalanceError },
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultError::NotInitialized => write!(f, "Vault monitor used before initialize()"),
            VaultError::Balance { vault, source } => {
                write!(f, "Failed to read {} vault balance: {}", vault, source)
            }
        }
    }
}

impl std::error::Error for VaultError {}

/// Balances of every vault at one block, keyed by vault key
#[derive(Debug, Clone, PartialEq)]
pub struct VaultSample {
    pub block: u64,
    pub balances: BTreeMap<String, f64>,
}

/// Blocks per sampling window, rounded to the nearest block (never zero)
///
/// A non-positive block time yields a one-block window.
pub fn window_blocks(window_minutes: u64, block_time_secs: f64) -> u64 {
    if !block_time_secs.is_finite() || block_time_secs <= 0.0 {
        return 1;
    }
    let blocks = ((window_minutes * 60) as f64 / block_time_secs).round() as u64;
    blocks.max(1)
}

pub struct VaultDriftMonitor {
    vaults: Vec<VaultSpec>,
    provider: Arc<dyn BalanceProvider>,
    window_blocks: u64,
    window_minutes: u64,
    threshold_pct: f64,
    sample: Mutex<Option<VaultSample>>,
}

impl VaultDriftMonitor {
    pub fn new(
        vaults: Vec<VaultSpec>,
        provider: Arc<dyn BalanceProvider>,
        window_minutes: u64,
        block_time_secs: f64,
        threshold_pct: f64,
    ) -> Self {
        Self {
            vaults,
            provider,
            window_blocks: window_blocks(window_minutes, block_time_secs),
            window_minutes,
            threshold_pct,
            sample: Mutex::new(None),
        }
    }

    pub fn window_blocks(&self) -> u64 {
        self.window_blocks
    }

    /// Last stored sample, if any
    pub async fn current_sample(&self) -> Option<VaultSample> {
        self.sample.lock().await.clone()
    }

    /// Read every vault at `block` and store the first sample
    ///
    /// Returns `<key>VaultBalance` per vault plus `poolBlockWindow`.
    pub async fn initialize(&self, block: u64) -> Result<BTreeMap<String, String>, VaultError> {
        let mut guard = self.sample.lock().await;
        let sample = self.read_sample(block).await?;

        let mut values = BTreeMap::new();
        for (key, balance) in &sample.balances {
            values.insert(format!("{}VaultBalance", key), balance.to_string());
        }
        values.insert(POOL_BLOCK_WINDOW_KEY.to_string(), self.window_blocks.to_string());

        log::info!("🏦 Vault monitor initialized at block {}", block);
        for (i, (key, balance)) in sample.balances.iter().enumerate() {
            let branch = if i + 1 == sample.balances.len() { "└─" } else { "├─" };
            log::info!("   {} {}: {:.2}", branch, key, balance);
        }

        *guard = Some(sample);
        Ok(values)
    }

    /// Sample on window boundaries and report vaults that drifted past the threshold
    pub async fn on_block(&self, block: u64) -> Result<Vec<Finding>, VaultError> {
        if block % self.window_blocks != 0 {
            return Ok(Vec::new());
        }

        // Held across the read so concurrent deliveries of the same window serialize
        let mut guard = self.sample.lock().await;
        let previous = guard.as_ref().ok_or(VaultError::NotInitialized)?;

        if block <= previous.block {
            log::debug!(
                "Ignoring vault window at block {} (sample already at {})",
                block,
                previous.block
            );
            return Ok(Vec::new());
        }

        let current = self.read_sample(block).await?;
        let findings = self.compare(previous, &current);

        log::info!(
            "🏦 Vault window at block {}: {} vaults sampled, {} drift findings",
            block,
            current.balances.len(),
            findings.len()
        );

        *guard = Some(current);
        Ok(findings)
    }

    async fn read_sample(&self, block: u64) -> Result<VaultSample, VaultError> {
        let mut balances = BTreeMap::new();
        for vault in &self.vaults {
            let balance = self
                .provider
                .balance_of(vault.token, vault.holder, vault.decimals, block)
                .await
                .map_err(|source| VaultError::Balance {
                    vault: vault.name.clone(),
                    source,
                })?;
            balances.insert(vault.key.clone(), balance);
        }
        Ok(VaultSample { block, balances })
    }

    fn compare(&self, previous: &VaultSample, current: &VaultSample) -> Vec<Finding> {
        let mut findings = Vec::new();

        for vault in &self.vaults {
            let (Some(&old), Some(&new)) = (
                previous.balances.get(&vault.key),
                current.balances.get(&vault.key),
            ) else {
                continue;
            };

            if old == 0.0 {
                log::warn!(
                    "⚠️  {} vault had zero balance at block {}, skipping drift check",
                    vault.name,
                    previous.block
                );
                continue;
            }

            let change_pct = (new - old) / old * 100.0;
            if change_pct.abs() > self.threshold_pct {
                findings.push(self.drift_finding(vault, old, new, change_pct));
            }
        }

        findings
    }

    fn drift_finding(&self, vault: &VaultSpec, old: f64, new: f64, change_pct: f64) -> Finding {
        let direction = if change_pct > 0.0 { "increased" } else { "decreased" };
        let description = format!(
            "{} vault balance has {} by {:.2}% during last {} min.\n\
             Previous balance: {:.2} {}\n\
             Current balance: {:.2} {}\n",
            vault.name,
            direction,
            change_pct.abs(),
            self.window_minutes,
            old,
            vault.token_symbol,
            new,
            vault.token_symbol
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("vault".to_string(), vault.key.clone());
        metadata.insert("previousBalance".to_string(), old.to_string());
        metadata.insert("currentBalance".to_string(), new.to_string());
        metadata.insert("changePercent".to_string(), format!("{:.2}", change_pct));

        let name = format!("Huge change in {} vault balance", vault.name);
        Finding::info(name, description, ALERT_VAULT_BALANCE_CHANGE)
            .with_metadata(metadata)
    }
}
