//! Ethereum mainnet registry of Lido-related tokens, contracts and vaults

use super::{
    parse_address, CurveCoin, CurvePool, ExchangeVenue, MonitoringTier, Registry, RegistryError, TokenInfo,
    VaultSpec,
};
use crate::correlation::template::{AddressPattern, ComplexTransferTemplate, LegPattern, TokenPattern};
use crate::correlation::TransferEvent;
use ethers::types::Address;

pub const LDO_TOKEN_ADDRESS: &str = "0x5a98fcbea516cf06857215779fd812ca3bef1b32";
pub const STETH_TOKEN_ADDRESS: &str = "0xae7ab96520de3a18e5e111b5eaab095312d7fe84";
pub const WSTETH_TOKEN_ADDRESS: &str = "0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0";
/// AAVE v2 astETH; also the holder of the AAVE stETH vault balance
pub const ASTETH_TOKEN_ADDRESS: &str = "0x1982b2f5814301d4e9a8b0201555376e62f82428";
pub const STECRV_TOKEN_ADDRESS: &str = "0x06325440d014e39736583c165c2963ba99faf14e";

pub const CURVE_STETH_POOL_ADDRESS: &str = "0xdc24316b9ae028f1497c275eb9192a3ea0f67022";
pub const BALANCER_VAULT_ADDRESS: &str = "0xba12222222228d8ba445958a75a0704d566bf2c8";
pub const WSTETH_A_VAULT_ADDRESS: &str = "0x10cd5fbe1b404b7e19ef964b63939907bdaf42e2";
pub const WSTETH_B_VAULT_ADDRESS: &str = "0x248ccbf4864221fc0e840f29bb042ad5bfc89b5c";
pub const LIDO_TREASURY_ADDRESS: &str = "0x3e40d73eb977dc6a537af587d48316fee66e9c8c";
pub const LIDO_WITHDRAWAL_QUEUE_ADDRESS: &str = "0x889edc2edab5f40e902b864ad4d7ade8e412f9b1";

pub const ETH_DECIMALS: u32 = 18;

/// Transfers of stETH/wstETH above this many tokens are material
pub const STETH_THRESHOLD: f64 = 10_000.0;
pub const LDO_THRESHOLD: f64 = 500_000.0;
pub const PARTIAL_TOKEN_THRESHOLD: f64 = 10_000.0;

struct Addresses {
    ldo: Address,
    steth: Address,
    wsteth: Address,
    asteth: Address,
    stecrv: Address,
    curve_pool: Address,
    balancer_vault: Address,
    wsteth_a_vault: Address,
    wsteth_b_vault: Address,
    treasury: Address,
    withdrawal_queue: Address,
}

impl Addresses {
    fn parse() -> Result<Self, RegistryError> {
        Ok(Self {
            ldo: parse_address(LDO_TOKEN_ADDRESS)?,
            steth: parse_address(STETH_TOKEN_ADDRESS)?,
            wsteth: parse_address(WSTETH_TOKEN_ADDRESS)?,
            asteth: parse_address(ASTETH_TOKEN_ADDRESS)?,
            stecrv: parse_address(STECRV_TOKEN_ADDRESS)?,
            curve_pool: parse_address(CURVE_STETH_POOL_ADDRESS)?,
            balancer_vault: parse_address(BALANCER_VAULT_ADDRESS)?,
            wsteth_a_vault: parse_address(WSTETH_A_VAULT_ADDRESS)?,
            wsteth_b_vault: parse_address(WSTETH_B_VAULT_ADDRESS)?,
            treasury: parse_address(LIDO_TREASURY_ADDRESS)?,
            withdrawal_queue: parse_address(LIDO_WITHDRAWAL_QUEUE_ADDRESS)?,
        })
    }
}

fn token(address: Address, symbol: &str, tier: MonitoringTier, threshold: f64) -> Result<TokenInfo, RegistryError> {
    TokenInfo::new(address, symbol, ETH_DECIMALS, tier, threshold)
}

/// `[in-leg, mint-leg]`: party sends `deposited` to `receiver`, gets `minted` from 0x0
fn deposit_and_mint(deposited: Address, receiver: Address, minted: Address) -> Vec<LegPattern> {
    vec![
        LegPattern::new(
            TokenPattern::One(deposited),
            AddressPattern::Party(0),
            AddressPattern::Exact(receiver),
        ),
        LegPattern::new(TokenPattern::One(minted), AddressPattern::Zero, AddressPattern::Party(0)),
    ]
}

/// `[burn-leg, out-leg]`: party burns `burned`, gets `released` back from `payer`
fn burn_and_release(burned: Address, payer: Address, released: Address) -> Vec<LegPattern> {
    vec![
        LegPattern::new(TokenPattern::One(burned), AddressPattern::Party(0), AddressPattern::Zero),
        LegPattern::new(
            TokenPattern::One(released),
            AddressPattern::Exact(payer),
            AddressPattern::Party(0),
        ),
    ]
}

fn wrap_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} stETH* wrapped to *{:.2} wstETH* by {}",
        legs[0].amount,
        legs[1].amount,
        registry.address_name(&legs[0].from)
    )
}

fn unwrap_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} wstETH* unwrapped to *{:.2} stETH* by {}",
        legs[0].amount,
        legs[1].amount,
        registry.address_name(&legs[0].from)
    )
}

fn aave_deposit_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} stETH* deposited to AAVE by {}",
        legs[0].amount,
        registry.address_name(&legs[0].from)
    )
}

fn aave_withdrawal_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} stETH* withdrawn from AAVE by {}",
        legs[1].amount,
        registry.address_name(&legs[1].to)
    )
}

fn curve_add_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} stETH* added to Curve stETH/ETH pool by {} ({:.2} steCRV minted)",
        legs[0].amount,
        registry.address_name(&legs[0].from),
        legs[1].amount
    )
}

fn curve_remove_text(legs: &[&TransferEvent], registry: &Registry) -> String {
    format!(
        "*{:.2} stETH* removed from Curve stETH/ETH pool by {} ({:.2} steCRV burned)",
        legs[1].amount,
        registry.address_name(&legs[1].to),
        legs[0].amount
    )
}

impl Registry {
    /// Registry used in production
    pub fn mainnet() -> Result<Self, RegistryError> {
        let a = Addresses::parse()?;

        let registry = Registry::new()
            .with_token(token(a.steth, "stETH", MonitoringTier::Full, STETH_THRESHOLD)?)
            .with_token(token(a.wsteth, "wstETH", MonitoringTier::Full, STETH_THRESHOLD)?)
            .with_token(token(a.ldo, "LDO", MonitoringTier::Full, LDO_THRESHOLD)?)
            .with_token(token(a.asteth, "astETH", MonitoringTier::Partial, PARTIAL_TOKEN_THRESHOLD)?)
            .with_token(token(a.stecrv, "steCRV", MonitoringTier::Partial, PARTIAL_TOKEN_THRESHOLD)?)
            .with_governance_token(a.ldo)
            .with_known_address(a.steth, "stETH contract")
            .with_known_address(a.wsteth, "wstETH contract")
            .with_known_address(a.asteth, "AAVE astETH")
            .with_known_address(a.curve_pool, "Curve.fi stETH/ETH pool")
            .with_known_address(a.balancer_vault, "Balancer V2 Vault")
            .with_known_address(a.wsteth_a_vault, "Maker wstETH-A vault")
            .with_known_address(a.wsteth_b_vault, "Maker wstETH-B vault")
            .with_known_address(a.treasury, "Lido DAO Treasury")
            .with_known_address(a.withdrawal_queue, "Lido Withdrawal Queue")
            .with_template(ComplexTransferTemplate::new(
                "wstETH wrap",
                deposit_and_mint(a.steth, a.wsteth, a.wsteth),
                wrap_text,
            ))
            .with_template(ComplexTransferTemplate::new(
                "wstETH unwrap",
                burn_and_release(a.wsteth, a.wsteth, a.steth),
                unwrap_text,
            ))
            .with_template(ComplexTransferTemplate::new(
                "AAVE stETH deposit",
                deposit_and_mint(a.steth, a.asteth, a.asteth),
                aave_deposit_text,
            ))
            .with_template(ComplexTransferTemplate::new(
                "AAVE stETH withdrawal",
                burn_and_release(a.asteth, a.asteth, a.steth),
                aave_withdrawal_text,
            ))
            .with_template(ComplexTransferTemplate::new(
                "Curve stETH liquidity add",
                deposit_and_mint(a.steth, a.curve_pool, a.stecrv),
                curve_add_text,
            ))
            .with_template(ComplexTransferTemplate::new(
                "Curve stETH liquidity removal",
                burn_and_release(a.stecrv, a.curve_pool, a.steth),
                curve_remove_text,
            ))
            .with_venue(ExchangeVenue {
                name: "Balancer V2 Vault".to_string(),
                address: a.balancer_vault,
                tokens: vec![a.steth, a.wsteth],
            })
            // coins(0) is native ETH, coins(1) is stETH
            .with_curve_pool(CurvePool {
                name: "Curve.fi stETH/ETH pool".to_string(),
                address: a.curve_pool,
                coins: vec![
                    CurveCoin {
                        symbol: "ETH".to_string(),
                        token: None,
                        decimals: ETH_DECIMALS,
                    },
                    CurveCoin {
                        symbol: "stETH".to_string(),
                        token: Some(a.steth),
                        decimals: ETH_DECIMALS,
                    },
                ],
            })
            .with_vault(VaultSpec {
                key: "aave".to_string(),
                name: "AAVE".to_string(),
                token: a.steth,
                token_symbol: "stETH".to_string(),
                decimals: ETH_DECIMALS,
                holder: a.asteth,
            })
            .with_vault(VaultSpec {
                key: "makerA".to_string(),
                name: "Maker wstETH-A".to_string(),
                token: a.wsteth,
                token_symbol: "wstETH".to_string(),
                decimals: ETH_DECIMALS,
                holder: a.wsteth_a_vault,
            })
            .with_vault(VaultSpec {
                key: "makerB".to_string(),
                name: "Maker wstETH-B".to_string(),
                token: a.wsteth,
                token_symbol: "wstETH".to_string(),
                decimals: ETH_DECIMALS,
                holder: a.wsteth_b_vault,
            });

        Ok(registry)
    }
}
