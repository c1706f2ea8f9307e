//! Polling block feed over HTTP JSON-RPC
//!
//! Walks the chain one block at a time from the start block up to the current
//! head, fetching the block's transactions with the `Transfer` logs of monitored
//! tokens and the `TokenExchange` logs of registered Curve pools, and hands each
//! block to the runtime as one [`FeedMessage`].

use super::{token_exchange_topic, transfer_topic, BlockEvent, TransactionEvent};
use crate::error_handler::{ExponentialBackoff, MaxRetriesExceeded};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Filter, Log, ValueOrArray, H256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum FeedError {
    InvalidUrl(String),
    Provider(String),
    BlockNotFound(u64),
    RetriesExhausted(MaxRetriesExceeded),
    ChannelClosed,
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::InvalidUrl(e) => write!(f, "Invalid RPC URL: {}", e),
            FeedError::Provider(e) => write!(f, "RPC error: {}", e),
            FeedError::BlockNotFound(n) => write!(f, "Block {} not found", n),
            FeedError::RetriesExhausted(e) => write!(f, "{}", e),
            FeedError::ChannelClosed => write!(f, "Feed receiver dropped"),
        }
    }
}

impl std::error::Error for FeedError {}

impl From<MaxRetriesExceeded> for FeedError {
    fn from(err: MaxRetriesExceeded) -> Self {
        FeedError::RetriesExhausted(err)
    }
}

/// One block and its transactions carrying watched logs
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub block: BlockEvent,
    pub transactions: Vec<TransactionEvent>,
}

pub struct EthersChainFeed {
    provider: Arc<Provider<Http>>,
    /// Monitored tokens plus Curve pools
    addresses: Vec<Address>,
    poll_interval: Duration,
    start_block: Option<u64>,
}

impl EthersChainFeed {
    pub fn new(
        provider: Arc<Provider<Http>>,
        addresses: Vec<Address>,
        poll_interval: Duration,
        start_block: Option<u64>,
    ) -> Self {
        Self {
            provider,
            addresses,
            poll_interval,
            start_block,
        }
    }

    pub fn starting_at(mut self, block: u64) -> Self {
        self.start_block = Some(block);
        self
    }

    /// HTTP provider for `rpc_url`, shared by the feed and balance reads
    pub fn connect(rpc_url: &str) -> Result<Arc<Provider<Http>>, FeedError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| FeedError::InvalidUrl(format!("{}: {}", rpc_url, e)))?;
        Ok(Arc::new(provider))
    }

    pub async fn head_block(&self) -> Result<u64, FeedError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| FeedError::Provider(e.to_string()))?;
        Ok(head.as_u64())
    }

    /// Fetch block `number` with its watched logs grouped per transaction
    pub async fn fetch_block(&self, number: u64) -> Result<FeedMessage, FeedError> {
        let block = self
            .provider
            .get_block_with_txs(number)
            .await
            .map_err(|e| FeedError::Provider(e.to_string()))?
            .ok_or(FeedError::BlockNotFound(number))?;

        let filter = Filter::new()
            .from_block(number)
            .to_block(number)
            .address(self.addresses.clone())
            .topic0(ValueOrArray::Array(vec![Some(transfer_topic()), Some(token_exchange_topic())]));
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| FeedError::Provider(e.to_string()))?;

        let mut by_tx = group_logs(logs);
        let transactions = block
            .transactions
            .iter()
            .filter_map(|tx| {
                by_tx.remove(&tx.hash).map(|logs| TransactionEvent {
                    hash: tx.hash,
                    from: tx.from,
                    block_number: number,
                    logs,
                })
            })
            .collect();

        if !by_tx.is_empty() {
            log::warn!(
                "⚠️  Block {}: {} transactions with logs missing from block body",
                number,
                by_tx.len()
            );
        }

        Ok(FeedMessage {
            block: BlockEvent { number },
            transactions,
        })
    }

    /// Poll until the receiver is dropped or the RPC keeps failing
    pub async fn run(self, tx: mpsc::Sender<FeedMessage>) -> Result<(), FeedError> {
        let mut backoff = ExponentialBackoff::new(500, 30_000, 10);

        let mut next = match self.start_block {
            Some(block) => block,
            None => self.with_retry(&mut backoff, |feed| feed.head_block()).await?,
        };

        log::info!("📡 Block feed started at block {}", next);
        log::info!("   ├─ Watched addresses: {}", self.addresses.len());
        log::info!("   └─ Poll interval: {}ms", self.poll_interval.as_millis());

        loop {
            let head = self.with_retry(&mut backoff, |feed| feed.head_block()).await?;

            while next <= head {
                let message = self.with_retry(&mut backoff, |feed| feed.fetch_block(next)).await?;
                tx.send(message).await.map_err(|_| FeedError::ChannelClosed)?;
                next += 1;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn with_retry<'a, T, F, Fut>(
        &'a self,
        backoff: &mut ExponentialBackoff,
        call: F,
    ) -> Result<T, FeedError>
    where
        F: Fn(&'a Self) -> Fut,
        Fut: std::future::Future<Output = Result<T, FeedError>>,
    {
        loop {
            match call(self).await {
                Ok(value) => {
                    backoff.reset();
                    return Ok(value);
                }
                Err(e) => {
                    log::warn!("⚠️  Feed RPC call failed: {}", e);
                    backoff.sleep().await?;
                }
            }
        }
    }
}

/// Logs grouped by transaction hash, each group kept in log order
fn group_logs(logs: Vec<Log>) -> HashMap<H256, Vec<Log>> {
    let mut by_tx: HashMap<H256, Vec<Log>> = HashMap::new();
    for log in logs {
        if log.removed == Some(true) {
            continue;
        }
        if let Some(hash) = log.transaction_hash {
            by_tx.entry(hash).or_default().push(log);
        }
    }
    for logs in by_tx.values_mut() {
        logs.sort_by_key(|l| l.log_index);
    }
    by_tx
}
