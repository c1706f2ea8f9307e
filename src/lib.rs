//! hugetx - huge token transfer and vault drift detector
//!
//! Watches blocks and transactions on an EVM chain, correlates ERC-20 `Transfer`
//! logs of monitored tokens into logical transfers (wraps, deposits, swaps) and
//! raises findings for the material ones. Independently samples a few custodial
//! vault balances every window and reports large drifts.
//!
//! # Architecture
//!
//! ```text
//! TransactionEvent ─→ correlation::normalizer ─→ WorkingSet
//!     ↓
//! ExchangeMatcher → TemplateMatcher (per template) → MaterialityFilter
//!     ↓
//! NarrativeAggregator ─→ Vec<Finding>
//!
//! BlockEvent ─→ VaultDriftMonitor (block % window == 0) ─→ Vec<Finding>
//! ```

pub mod agent;
pub mod chain;
pub mod config;
pub mod correlation;
pub mod error_handler;
pub mod findings;
pub mod persistence;
pub mod registry;
pub mod sink;
pub mod vault;

pub use agent::{AgentError, HugeTxAgent};
pub use chain::{BlockEvent, TransactionEvent};
pub use findings::{Finding, FindingSeverity, FindingType};
pub use registry::Registry;
