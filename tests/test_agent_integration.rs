//! End-to-end tests driving HugeTxAgent with hand-built logs and scripted balances

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Log, H256, U256};
use hugetx::agent::{AgentError, DetectorSettings};
use hugetx::chain::{format_address, format_hash, token_exchange_topic, transfer_topic, BlockEvent, TransactionEvent};
use hugetx::findings::{ALERT_HUGE_TRANSFERS_IN_TX, ALERT_HUGE_TRANSFERS_TECH, ALERT_VAULT_BALANCE_CHANGE};
use hugetx::registry::mainnet::*;
use hugetx::registry::parse_address;
use hugetx::vault::{BalanceError, BalanceProvider};
use hugetx::{HugeTxAgent, Registry};
use std::collections::HashMap;
use std::sync::Arc;

struct ScriptedBalances {
    balances: HashMap<(Address, u64), f64>,
}

#[async_trait]
impl BalanceProvider for ScriptedBalances {
    async fn balance_of(
        &self,
        _token: Address,
        holder: Address,
        _decimals: u32,
        block: u64,
    ) -> Result<f64, BalanceError> {
        self.balances
            .get(&(holder, block))
            .copied()
            .ok_or_else(|| BalanceError::Rpc(format!("no scripted balance at block {}", block)))
    }
}

fn addr(s: &str) -> Address {
    parse_address(s).unwrap()
}

fn user() -> Address {
    Address::repeat_byte(0x11)
}

fn tx_hash() -> H256 {
    H256::repeat_byte(0xab)
}

fn agent_with(balances: Vec<((Address, u64), f64)>) -> HugeTxAgent {
    let registry = Arc::new(Registry::mainnet().unwrap());
    let provider = Arc::new(ScriptedBalances {
        balances: balances.into_iter().collect(),
    });
    HugeTxAgent::new(registry, provider, DetectorSettings::default())
}

fn agent() -> HugeTxAgent {
    agent_with(Vec::new())
}

fn whole(tokens: u64) -> U256 {
    U256::exp10(18) * U256::from(tokens)
}

fn transfer_log(token: &str, from: Address, to: Address, tokens: u64, log_index: u64) -> Log {
    raw_transfer_log(token, from, to, whole(tokens), log_index)
}

fn raw_transfer_log(token: &str, from: Address, to: Address, raw: U256, log_index: u64) -> Log {
    let mut data = [0u8; 32];
    raw.to_big_endian(&mut data);

    Log {
        address: addr(token),
        topics: vec![transfer_topic(), H256::from(from), H256::from(to)],
        data: Bytes::from(data.to_vec()),
        log_index: Some(U256::from(log_index)),
        transaction_hash: Some(tx_hash()),
        ..Default::default()
    }
}

fn curve_exchange_log(buyer: Address, sold_id: u64, sold: U256, bought_id: u64, bought: U256, log_index: u64) -> Log {
    let mut data = [0u8; 128];
    U256::from(sold_id).to_big_endian(&mut data[0..32]);
    sold.to_big_endian(&mut data[32..64]);
    U256::from(bought_id).to_big_endian(&mut data[64..96]);
    bought.to_big_endian(&mut data[96..128]);

    Log {
        address: addr(CURVE_STETH_POOL_ADDRESS),
        topics: vec![token_exchange_topic(), H256::from(buyer)],
        data: Bytes::from(data.to_vec()),
        log_index: Some(U256::from(log_index)),
        transaction_hash: Some(tx_hash()),
        ..Default::default()
    }
}

fn transaction(logs: Vec<Log>) -> TransactionEvent {
    TransactionEvent {
        hash: tx_hash(),
        from: user(),
        block_number: 17_000_000,
        logs,
    }
}

fn link() -> String {
    format!("https://etherscan.io/tx/{}", format_hash(&tx_hash()))
}

#[test]
fn test_no_monitored_transfers_no_findings() {
    let agent = agent();
    let other_token = "0x1111111111111111111111111111111111111111";

    let findings = agent
        .handle_transaction(&transaction(vec![transfer_log(other_token, user(), Address::repeat_byte(2), 1_000_000, 0)]))
        .unwrap();
    assert!(findings.is_empty());

    let findings = agent.handle_transaction(&transaction(Vec::new())).unwrap();
    assert!(findings.is_empty());
}

#[test]
fn test_wrap_plus_simple_transfer() {
    // Test: deposit + mint pair is narrated as one wrap, the unrelated transfer separately
    let agent = agent();
    let wsteth = addr(WSTETH_TOKEN_ADDRESS);
    let treasury = addr(LIDO_TREASURY_ADDRESS);

    let tx = transaction(vec![
        transfer_log(WSTETH_TOKEN_ADDRESS, user(), treasury, 15_000, 8),
        transfer_log(STETH_TOKEN_ADDRESS, user(), wsteth, 20_000, 2),
        transfer_log(WSTETH_TOKEN_ADDRESS, Address::zero(), user(), 17_000, 3),
    ]);

    let findings = agent.handle_transaction(&tx).unwrap();

    assert_eq!(findings.len(), 3);

    let narrative = &findings[0];
    assert_eq!(narrative.alert_id, ALERT_HUGE_TRANSFERS_IN_TX);
    let user_hex = format_address(&user());
    assert_eq!(
        narrative.description,
        format!(
            "*20000.00 stETH* wrapped to *17000.00 wstETH* by {}\n\
             *15000.00 wstETH* transferred from {} to Lido DAO Treasury\n{}",
            user_hex,
            user_hex,
            link()
        )
    );

    let wrap = &findings[1];
    assert_eq!(wrap.alert_id, ALERT_HUGE_TRANSFERS_TECH);
    assert_eq!(wrap.metadata["template"], "wstETH wrap");
    assert_eq!(wrap.metadata["tokenName"], "stETH");

    let simple = &findings[2];
    assert_eq!(simple.alert_id, ALERT_HUGE_TRANSFERS_TECH);
    assert_eq!(simple.metadata["tokenName"], "wstETH");
    assert_eq!(simple.metadata["toName"], "Lido DAO Treasury");
    assert!(simple
        .description
        .starts_with(&format!("15000.00 wstETH transferred from {} to Lido DAO Treasury\n", user_hex)));
    assert!(simple.description.ends_with("Do not route it to the alerts channel!"));
}

#[test]
fn test_immaterial_wrap_consumed_silently() {
    let agent = agent();
    let wsteth = addr(WSTETH_TOKEN_ADDRESS);

    let tx = transaction(vec![
        transfer_log(STETH_TOKEN_ADDRESS, user(), wsteth, 10, 0),
        transfer_log(WSTETH_TOKEN_ADDRESS, Address::zero(), user(), 9, 1),
    ]);

    assert!(agent.handle_transaction(&tx).unwrap().is_empty());
}

#[test]
fn test_governance_token_has_no_tech_finding() {
    let agent = agent();
    let treasury = addr(LIDO_TREASURY_ADDRESS);

    let findings = agent
        .handle_transaction(&transaction(vec![transfer_log(LDO_TOKEN_ADDRESS, treasury, user(), 600_000, 4)]))
        .unwrap();

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].alert_id, ALERT_HUGE_TRANSFERS_IN_TX);
    assert!(findings[0].description.starts_with("*600000.00 LDO* transferred from Lido DAO Treasury to "));
}

#[test]
fn test_threshold_boundary() {
    let agent = agent();
    let to = Address::repeat_byte(0x22);

    let at = agent
        .handle_transaction(&transaction(vec![transfer_log(STETH_TOKEN_ADDRESS, user(), to, 10_000, 0)]))
        .unwrap();
    assert!(at.is_empty());

    let above = agent
        .handle_transaction(&transaction(vec![transfer_log(STETH_TOKEN_ADDRESS, user(), to, 10_001, 0)]))
        .unwrap();
    assert_eq!(above.len(), 2);
}

#[test]
fn test_one_wei_above_threshold_reported() {
    let agent = agent();
    let to = Address::repeat_byte(0x22);
    let raw = whole(10_000) + U256::one();

    let findings = agent
        .handle_transaction(&transaction(vec![raw_transfer_log(STETH_TOKEN_ADDRESS, user(), to, raw, 0)]))
        .unwrap();

    assert_eq!(findings.len(), 2);
    assert_eq!(findings[1].metadata["amount"], "10000");
}

#[test]
fn test_curve_steth_sold_for_eth() {
    // Test: the ETH side has no Transfer log; the exchange log supplies it
    let agent = agent();
    let pool = addr(CURVE_STETH_POOL_ADDRESS);

    let tx = transaction(vec![
        transfer_log(STETH_TOKEN_ADDRESS, user(), pool, 20_000, 1),
        curve_exchange_log(user(), 1, whole(20_000), 0, whole(19_950), 2),
    ]);

    let findings = agent.handle_transaction(&tx).unwrap();

    assert_eq!(findings.len(), 2);
    assert_eq!(
        findings[0].description,
        format!(
            "*20000.00 stETH* exchanged for *19950.00 ETH* by {} on Curve.fi stETH/ETH pool\n{}",
            format_address(&user()),
            link()
        )
    );
    let tech = &findings[1];
    assert_eq!(tech.alert_id, ALERT_HUGE_TRANSFERS_TECH);
    assert_eq!(tech.metadata["exchange"], "Curve.fi stETH/ETH pool");
    assert_eq!(tech.metadata["tokenOutName"], "ETH");
    assert_eq!(tech.metadata["amountOut"], "19950");
}

#[test]
fn test_malformed_curve_exchange_fails_transaction() {
    let agent = agent();
    let pool = addr(CURVE_STETH_POOL_ADDRESS);
    let mut bad = curve_exchange_log(user(), 1, whole(20_000), 0, whole(19_950), 2);
    bad.data = Bytes::from(vec![0u8; 96]);

    let tx = transaction(vec![transfer_log(STETH_TOKEN_ADDRESS, user(), pool, 20_000, 1), bad]);

    assert!(matches!(agent.handle_transaction(&tx), Err(AgentError::Normalize(_))));
}

#[test]
fn test_balancer_swap_plus_wrap() {
    // Test: swap legs are claimed by the venue, never by a template or as simple transfers
    let agent = agent();
    let vault = addr(BALANCER_VAULT_ADDRESS);
    let wsteth = addr(WSTETH_TOKEN_ADDRESS);

    let tx = transaction(vec![
        transfer_log(STETH_TOKEN_ADDRESS, user(), vault, 20_000, 1),
        transfer_log(WSTETH_TOKEN_ADDRESS, vault, user(), 17_000, 2),
        transfer_log(STETH_TOKEN_ADDRESS, user(), wsteth, 30_000, 4),
        transfer_log(WSTETH_TOKEN_ADDRESS, Address::zero(), user(), 26_000, 5),
    ]);

    let findings = agent.handle_transaction(&tx).unwrap();

    assert_eq!(findings.len(), 3);
    let user_hex = format_address(&user());
    assert_eq!(
        findings[0].description,
        format!(
            "*20000.00 stETH* exchanged for *17000.00 wstETH* by {} via Balancer V2 Vault\n\
             *30000.00 stETH* wrapped to *26000.00 wstETH* by {}\n{}",
            user_hex,
            user_hex,
            link()
        )
    );
    assert!(!findings[0].description.contains("transferred"));
    assert_eq!(findings[1].metadata["exchange"], "Balancer V2 Vault");
    assert!(!findings[1].metadata.contains_key("template"));
    assert_eq!(findings[2].metadata["template"], "wstETH wrap");
}

#[test]
fn test_malformed_monitored_log_fails_transaction() {
    let agent = agent();
    let mut bad = transfer_log(STETH_TOKEN_ADDRESS, user(), Address::repeat_byte(0x22), 50_000, 1);
    bad.topics.truncate(2);

    let tx = transaction(vec![
        transfer_log(STETH_TOKEN_ADDRESS, user(), Address::repeat_byte(0x22), 50_000, 0),
        bad,
    ]);

    assert!(matches!(agent.handle_transaction(&tx), Err(AgentError::Normalize(_))));
}

fn vault_script(block: u64, aave: f64, maker_a: f64, maker_b: f64) -> Vec<((Address, u64), f64)> {
    vec![
        ((addr(ASTETH_TOKEN_ADDRESS), block), aave),
        ((addr(WSTETH_A_VAULT_ADDRESS), block), maker_a),
        ((addr(WSTETH_B_VAULT_ADDRESS), block), maker_b),
    ]
}

#[tokio::test]
async fn test_initialize_then_drift_window() {
    let n = 690;
    let mut script = vault_script(n, 1000.0, 2000.0, 3000.0);
    script.extend(vault_script(n + 69, 1170.0, 2000.0, 3000.0));
    let agent = agent_with(script);

    let values = agent.initialize(n).await.unwrap();

    assert_eq!(values.len(), 4);
    assert_eq!(values["aaveVaultBalance"], "1000");
    assert_eq!(values["makerAVaultBalance"], "2000");
    assert_eq!(values["makerBVaultBalance"], "3000");
    assert_eq!(values["poolBlockWindow"], "69");

    // Off-window blocks never sample
    assert!(agent.handle_block(&BlockEvent { number: n + 1 }).await.unwrap().is_empty());

    let findings = agent.handle_block(&BlockEvent { number: n + 69 }).await.unwrap();

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].alert_id, ALERT_VAULT_BALANCE_CHANGE);
    assert_eq!(findings[0].name, "Huge change in AAVE vault balance");
    assert_eq!(
        findings[0].description,
        "AAVE vault balance has increased by 17.00% during last 15 min.\n\
         Previous balance: 1000.00 stETH\n\
         Current balance: 1170.00 stETH\n"
    );
}

#[tokio::test]
async fn test_failed_window_retains_sample() {
    let n = 690;
    let mut script = vault_script(n, 1000.0, 2000.0, 3000.0);
    // Window n + 69 has no data; n + 138 compares against the initial sample
    script.extend(vault_script(n + 138, 1000.0, 2000.0, 1000.0));
    let agent = agent_with(script);

    agent.initialize(n).await.unwrap();

    assert!(matches!(
        agent.handle_block(&BlockEvent { number: n + 69 }).await,
        Err(AgentError::Vault(_))
    ));

    let findings = agent.handle_block(&BlockEvent { number: n + 138 }).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].description.starts_with("Maker wstETH-B vault balance has decreased by 66.67%"));
}

#[tokio::test]
async fn test_initialize_failure_is_error() {
    let agent = agent();
    assert!(matches!(agent.initialize(690).await, Err(AgentError::Vault(_))));
}
