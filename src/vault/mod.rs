//! Custodial vault balance monitoring

pub mod balance;
pub mod monitor;

pub use balance::{BalanceError, BalanceProvider, EthersBalanceProvider};
pub use monitor::{window_blocks, VaultDriftMonitor, VaultError, VaultSample};
