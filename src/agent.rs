//! Agent facade: the three entry points the host drives
//!
//! `handle_transaction` runs the correlation engine, `handle_block` runs the
//! vault drift monitor. The two share nothing but the registry.

use crate::chain::{BlockEvent, TransactionEvent};
use crate::config::AgentConfig;
use crate::correlation::{CorrelationEngine, NormalizeError};
use crate::findings::Finding;
use crate::registry::Registry;
use crate::vault::{BalanceProvider, VaultDriftMonitor, VaultError};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
pub enum AgentError {
    Normalize(NormalizeError),
    Vault(VaultError),
}

impl From<NormalizeError> for AgentError {
    fn from(err: NormalizeError) -> Self {
        AgentError::Normalize(err)
    }
}

impl From<VaultError> for AgentError {
    fn from(err: VaultError) -> Self {
        AgentError::Vault(err)
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Normalize(e) => write!(f, "Malformed transfer log: {}", e),
            AgentError::Vault(e) => write!(f, "Vault sampling failed: {}", e),
        }
    }
}

impl std::error::Error for AgentError {}

/// Detector tuning, independent of where events come from
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub explorer_tx_url: String,
    pub vault_window_minutes: u64,
    pub avg_block_time_secs: f64,
    pub vault_drift_threshold_pct: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            explorer_tx_url: "https://etherscan.io/tx/".to_string(),
            vault_window_minutes: 15,
            avg_block_time_secs: 13.0,
            vault_drift_threshold_pct: 15.0,
        }
    }
}

impl From<&AgentConfig> for DetectorSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            explorer_tx_url: config.explorer_tx_url.clone(),
            vault_window_minutes: config.vault_window_minutes,
            avg_block_time_secs: config.avg_block_time_secs,
            vault_drift_threshold_pct: config.vault_drift_threshold_pct,
        }
    }
}

pub struct HugeTxAgent {
    correlation: CorrelationEngine,
    vaults: VaultDriftMonitor,
}

impl HugeTxAgent {
    pub fn new(registry: Arc<Registry>, provider: Arc<dyn BalanceProvider>, settings: DetectorSettings) -> Self {
        let vaults = VaultDriftMonitor::new(
            registry.vaults().to_vec(),
            provider,
            settings.vault_window_minutes,
            settings.avg_block_time_secs,
            settings.vault_drift_threshold_pct,
        );

        Self {
            correlation: CorrelationEngine::new(registry, &settings.explorer_tx_url),
            vaults,
        }
    }

    pub fn window_blocks(&self) -> u64 {
        self.vaults.window_blocks()
    }

    /// Take the first vault sample; a failed read fails startup
    pub async fn initialize(&self, block: u64) -> Result<BTreeMap<String, String>, AgentError> {
        Ok(self.vaults.initialize(block).await?)
    }

    pub async fn handle_block(&self, block: &BlockEvent) -> Result<Vec<Finding>, AgentError> {
        Ok(self.vaults.on_block(block.number).await?)
    }

    pub fn handle_transaction(&self, tx: &TransactionEvent) -> Result<Vec<Finding>, AgentError> {
        Ok(self.correlation.process_transaction(tx)?)
    }
}
