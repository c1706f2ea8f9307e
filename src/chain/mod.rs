//! Chain-facing event types delivered to the agent
//!
//! `BlockEvent` and `TransactionEvent` are what the host hands to
//! [`crate::HugeTxAgent`]. The `feed` submodule produces them from a JSON-RPC
//! endpoint; tests build them by hand.

pub mod feed;

use ethers::types::{Address, Log, H256};
use ethers::utils::keccak256;

pub use feed::{EthersChainFeed, FeedError, FeedMessage};

/// ERC-20 `Transfer` event signature
pub const TRANSFER_EVENT_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Curve pool swap event; sold/bought ids index the pool's coins
pub const TOKEN_EXCHANGE_EVENT_SIGNATURE: &str = "TokenExchange(address,int128,uint256,int128,uint256)";

/// topic0 of the ERC-20 `Transfer` event
pub fn transfer_topic() -> H256 {
    H256::from(keccak256(TRANSFER_EVENT_SIGNATURE))
}

pub fn token_exchange_topic() -> H256 {
    H256::from(keccak256(TOKEN_EXCHANGE_EVENT_SIGNATURE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    pub number: u64,
}

/// One transaction together with the logs it emitted, in log order
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub hash: H256,
    /// Transaction originator
    pub from: Address,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

impl TransactionEvent {
    /// Logs whose topic0 is the `Transfer` signature
    pub fn transfer_logs(&self) -> impl Iterator<Item = &Log> {
        self.logs_with_topic(transfer_topic())
    }

    /// Logs whose topic0 is the Curve `TokenExchange` signature
    pub fn token_exchange_logs(&self) -> impl Iterator<Item = &Log> {
        self.logs_with_topic(token_exchange_topic())
    }

    fn logs_with_topic(&self, topic: H256) -> impl Iterator<Item = &Log> {
        self.logs
            .iter()
            .filter(move |log| log.topics.first() == Some(&topic))
    }
}

/// Full lowercase `0x`-prefixed hex of an address
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Full lowercase `0x`-prefixed hex of a hash
pub fn format_hash(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}
