//! Vault balance reads at a historical block

use crate::correlation::normalizer::to_decimal_amount;
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, BlockId};
use std::sync::Arc;

abigen!(
    Erc20Balance,
    r#"[
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

#[derive(Debug)]
pub enum BalanceError {
    Rpc(String),
    Conversion(String),
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::Rpc(e) => write!(f, "balanceOf call failed: {}", e),
            BalanceError::Conversion(e) => write!(f, "Balance conversion error: {}", e),
        }
    }
}

impl std::error::Error for BalanceError {}

/// Source of decimal-adjusted ERC-20 balances
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        decimals: u32,
        block: u64,
    ) -> Result<f64, BalanceError>;
}

/// `balanceOf` over HTTP JSON-RPC, evaluated at the requested block tag
pub struct EthersBalanceProvider {
    provider: Arc<Provider<Http>>,
}

impl EthersBalanceProvider {
    pub fn new(provider: Arc<Provider<Http>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl BalanceProvider for EthersBalanceProvider {
    async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        decimals: u32,
        block: u64,
    ) -> Result<f64, BalanceError> {
        let contract = Erc20Balance::new(token, self.provider.clone());
        let raw = contract
            .balance_of(holder)
            .block(BlockId::from(block))
            .call()
            .await
            .map_err(|e| BalanceError::Rpc(e.to_string()))?;

        to_decimal_amount(raw, decimals).map_err(|e| BalanceError::Conversion(e.to_string()))
    }
}
