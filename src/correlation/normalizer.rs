//! Transfer normalization from raw `Transfer` logs to a uniform `TransferEvent`

use crate::chain::TransactionEvent;
use crate::registry::Registry;
use ethers::types::{Address, Log, H256, U256};
use ethers::utils::format_units;

/// One ERC-20 transfer of a monitored token
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub raw_amount: U256,
    /// `raw_amount / 10^decimals` of the token
    pub amount: f64,
    pub log_index: u64,
    pub tx_hash: H256,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// A `Transfer` of an ERC-20 has exactly 3 topics (signature, from, to)
    UnexpectedTopicCount { token: Address, count: usize },
    /// The amount is the only non-indexed argument: exactly one 32-byte word
    InvalidDataLength { token: Address, len: usize },
    MissingLogIndex { token: Address },
    LogIndexOverflow { token: Address },
    UnmonitoredToken(Address),
    AmountConversion(String),
    /// A registered Curve pool emitted a `TokenExchange` that cannot be decoded
    InvalidExchangeLog { pool: Address, reason: String },
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::UnexpectedTopicCount { token, count } => {
                write!(f, "Transfer log of {:?} has {} topics, expected 3", token, count)
            }
            NormalizeError::InvalidDataLength { token, len } => {
                write!(f, "Transfer log of {:?} has {} data bytes, expected 32", token, len)
            }
            NormalizeError::MissingLogIndex { token } => {
                write!(f, "Transfer log of {:?} has no log index", token)
            }
            NormalizeError::LogIndexOverflow { token } => {
                write!(f, "Transfer log of {:?} has a log index above u64", token)
            }
            NormalizeError::UnmonitoredToken(token) => {
                write!(f, "Token {:?} is not in the monitored registry", token)
            }
            NormalizeError::AmountConversion(e) => write!(f, "Amount conversion error: {}", e),
            NormalizeError::InvalidExchangeLog { pool, reason } => {
                write!(f, "TokenExchange log of pool {:?}: {}", pool, reason)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Convert a raw token amount to a decimal-adjusted value
pub fn to_decimal_amount(raw: U256, decimals: u32) -> Result<f64, NormalizeError> {
    let formatted =
        format_units(raw, decimals).map_err(|e| NormalizeError::AmountConversion(e.to_string()))?;
    formatted
        .parse::<f64>()
        .map_err(|e| NormalizeError::AmountConversion(format!("{}: {}", formatted, e)))
}

/// Normalize one `Transfer` log emitted in transaction `tx_hash`
pub fn normalize(log: &Log, tx_hash: H256, registry: &Registry) -> Result<TransferEvent, NormalizeError> {
    let token = log.address;
    let info = registry
        .token(&token)
        .ok_or(NormalizeError::UnmonitoredToken(token))?;

    if log.topics.len() != 3 {
        return Err(NormalizeError::UnexpectedTopicCount {
            token,
            count: log.topics.len(),
        });
    }

    if log.data.len() != 32 {
        return Err(NormalizeError::InvalidDataLength {
            token,
            len: log.data.len(),
        });
    }

    let log_index = log.log_index.ok_or(NormalizeError::MissingLogIndex { token })?;
    if log_index > U256::from(u64::MAX) {
        return Err(NormalizeError::LogIndexOverflow { token });
    }

    // Indexed addresses are left-padded to 32 bytes
    let from = Address::from_slice(&log.topics[1].as_bytes()[12..]);
    let to = Address::from_slice(&log.topics[2].as_bytes()[12..]);
    let raw_amount = U256::from_big_endian(&log.data);
    let amount = to_decimal_amount(raw_amount, info.decimals)?;

    Ok(TransferEvent {
        token,
        from,
        to,
        raw_amount,
        amount,
        log_index: log_index.low_u64(),
        tx_hash,
    })
}

/// Normalize every monitored `Transfer` log of a transaction, in log order
///
/// Logs of tokens outside the registry are skipped; a malformed log of a
/// monitored token fails the whole transaction.
pub fn normalize_transaction(
    tx: &TransactionEvent,
    registry: &Registry,
) -> Result<Vec<TransferEvent>, NormalizeError> {
    tx.transfer_logs()
        .filter(|log| registry.is_monitored(&log.address))
        .map(|log| normalize(log, tx.hash, registry))
        .collect()
}
