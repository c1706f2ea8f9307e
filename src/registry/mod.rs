//! Static registries: monitored tokens, labelled addresses, complex transfer
//! templates, exchange venues and sampled vaults
//!
//! Built once at startup and shared read-only (`Arc<Registry>`) by every
//! invocation. Nothing in here is ever mutated after construction.

pub mod mainnet;

use crate::chain::format_address;
use crate::correlation::template::ComplexTransferTemplate;
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringTier {
    /// Any transfer above the threshold is material
    Full,
    /// Above the threshold AND one side is a labelled address
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u32,
    pub tier: MonitoringTier,
    /// Decimal-adjusted amount a transfer must exceed to be material
    pub threshold: f64,
    /// `threshold` in raw token units; the materiality comparison uses this
    pub raw_threshold: U256,
}

impl TokenInfo {
    pub fn new(
        address: Address,
        symbol: &str,
        decimals: u32,
        tier: MonitoringTier,
        threshold: f64,
    ) -> Result<Self, RegistryError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(RegistryError::InvalidThreshold(format!("{} {}", threshold, symbol)));
        }
        let raw_threshold: U256 = parse_units(threshold, decimals)
            .map_err(|e| RegistryError::InvalidThreshold(format!("{} {}: {}", threshold, symbol, e)))?
            .into();

        Ok(Self {
            address,
            symbol: symbol.to_string(),
            decimals,
            tier,
            threshold,
            raw_threshold,
        })
    }
}

/// Pool or router through which one listed token goes in and another comes out
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeVenue {
    pub name: String,
    pub address: Address,
    pub tokens: Vec<Address>,
}

impl ExchangeVenue {
    pub fn lists(&self, token: &Address) -> bool {
        self.tokens.contains(token)
    }
}

/// One coin of a Curve pool, by its index in the pool
#[derive(Debug, Clone, PartialEq)]
pub struct CurveCoin {
    pub symbol: String,
    /// `None` for native ETH, which emits no `Transfer` log
    pub token: Option<Address>,
    pub decimals: u32,
}

/// Curve pool whose `TokenExchange` logs narrate swaps
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePool {
    pub name: String,
    pub address: Address,
    pub coins: Vec<CurveCoin>,
}

impl CurvePool {
    pub fn coin(&self, index: usize) -> Option<&CurveCoin> {
        self.coins.get(index)
    }
}

/// A custodial balance sampled by the vault drift monitor
#[derive(Debug, Clone, PartialEq)]
pub struct VaultSpec {
    /// Short camelCase key used in the initialization map (`<key>VaultBalance`)
    pub key: String,
    pub name: String,
    pub token: Address,
    pub token_symbol: String,
    pub decimals: u32,
    pub holder: Address,
}

#[derive(Debug)]
pub enum RegistryError {
    InvalidAddress(String),
    InvalidThreshold(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidAddress(s) => write!(f, "Invalid registry address: {}", s),
            RegistryError::InvalidThreshold(s) => write!(f, "Invalid token threshold: {}", s),
        }
    }
}

impl std::error::Error for RegistryError {}

pub fn parse_address(s: &str) -> Result<Address, RegistryError> {
    Address::from_str(s).map_err(|_| RegistryError::InvalidAddress(s.to_string()))
}

pub struct Registry {
    tokens: HashMap<Address, TokenInfo>,
    governance_token: Option<Address>,
    known_addresses: HashMap<Address, String>,
    templates: Vec<ComplexTransferTemplate>,
    venues: Vec<ExchangeVenue>,
    curve_pools: Vec<CurvePool>,
    vaults: Vec<VaultSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            governance_token: None,
            known_addresses: HashMap::new(),
            templates: Vec::new(),
            venues: Vec::new(),
            curve_pools: Vec::new(),
            vaults: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: TokenInfo) -> Self {
        self.tokens.insert(token.address, token);
        self
    }

    /// Simple transfers of this token are narrated but never get a tech record
    pub fn with_governance_token(mut self, token: Address) -> Self {
        self.governance_token = Some(token);
        self
    }

    pub fn with_known_address(mut self, address: Address, name: &str) -> Self {
        self.known_addresses.insert(address, name.to_string());
        self
    }

    /// Templates are tried in insertion order
    pub fn with_template(mut self, template: ComplexTransferTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_venue(mut self, venue: ExchangeVenue) -> Self {
        self.venues.push(venue);
        self
    }

    pub fn with_curve_pool(mut self, pool: CurvePool) -> Self {
        self.curve_pools.push(pool);
        self
    }

    pub fn with_vault(mut self, vault: VaultSpec) -> Self {
        self.vaults.push(vault);
        self
    }

    pub fn token(&self, address: &Address) -> Option<&TokenInfo> {
        self.tokens.get(address)
    }

    pub fn is_monitored(&self, address: &Address) -> bool {
        self.tokens.contains_key(address)
    }

    pub fn is_governance_token(&self, address: &Address) -> bool {
        self.governance_token.as_ref() == Some(address)
    }

    pub fn token_symbol(&self, address: &Address) -> String {
        self.tokens
            .get(address)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| format_address(address))
    }

    pub fn is_known(&self, address: &Address) -> bool {
        self.known_addresses.contains_key(address)
    }

    /// Label of a known address, or its full hex
    pub fn address_name(&self, address: &Address) -> String {
        self.known_addresses
            .get(address)
            .cloned()
            .unwrap_or_else(|| format_address(address))
    }

    /// Monitored token addresses, sorted for stable RPC filters
    pub fn monitored_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.tokens.keys().copied().collect();
        addresses.sort();
        addresses
    }

    /// Contracts whose logs the feed must fetch: monitored tokens and Curve pools
    pub fn watched_addresses(&self) -> Vec<Address> {
        let mut addresses = self.monitored_addresses();
        addresses.extend(self.curve_pools.iter().map(|p| p.address));
        addresses.sort();
        addresses.dedup();
        addresses
    }

    pub fn curve_pool(&self, address: &Address) -> Option<&CurvePool> {
        self.curve_pools.iter().find(|p| &p.address == address)
    }

    pub fn curve_pools(&self) -> &[CurvePool] {
        &self.curve_pools
    }

    pub fn templates(&self) -> &[ComplexTransferTemplate] {
        &self.templates
    }

    pub fn venues(&self) -> &[ExchangeVenue] {
        &self.venues
    }

    pub fn vaults(&self) -> &[VaultSpec] {
        &self.vaults
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
