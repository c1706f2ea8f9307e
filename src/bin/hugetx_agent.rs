//! Huge TX Agent Runtime
//!
//! Polls an Ethereum JSON-RPC endpoint block by block and feeds every block and
//! every transaction carrying monitored `Transfer` logs into the detector.
//! Findings go to the configured sink.
//!
//! Usage:
//!   cargo run --release --bin hugetx_agent
//!
//! Environment variables:
//!   ETH_RPC_URL - HTTP JSON-RPC endpoint (required)
//!   START_BLOCK - First block to process (default: current head)
//!   FINDINGS_BACKEND - jsonl | log (default: jsonl)
//!   FINDINGS_PATH - JSONL output file (default: findings.jsonl)
//!   SNAPSHOT_PATH - Initialization snapshot (default: init_snapshot.json)

use dotenv::dotenv;
use hugetx::agent::DetectorSettings;
use hugetx::chain::{format_hash, EthersChainFeed, FeedMessage};
use hugetx::config::{log_builder, AgentConfig};
use hugetx::persistence::{load_snapshot, save_snapshot, InitSnapshot};
use hugetx::sink::{create_sink, FindingSink};
use hugetx::vault::EthersBalanceProvider;
use hugetx::{Finding, HugeTxAgent, Registry};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

const FEED_CHANNEL_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    log_builder().init();

    let config = AgentConfig::from_env()?;
    let registry = Arc::new(Registry::mainnet()?);

    info!("🚀 Huge TX detector");
    info!("   ├─ RPC: {}", config.rpc_url);
    info!("   ├─ Monitored tokens: {}", registry.monitored_addresses().len());
    info!("   ├─ Curve pools: {}", registry.curve_pools().len());
    info!("   ├─ Templates: {}", registry.templates().len());
    info!("   ├─ Vaults: {}", registry.vaults().len());
    info!(
        "   ├─ Drift window: {} min @ {}s blocks, threshold {}%",
        config.vault_window_minutes, config.avg_block_time_secs, config.vault_drift_threshold_pct
    );
    info!("   └─ Findings backend: {:?} ({})", config.findings_backend, config.findings_path);

    let provider = EthersChainFeed::connect(&config.rpc_url)?;
    let balances = Arc::new(EthersBalanceProvider::new(provider.clone()));
    let agent = HugeTxAgent::new(registry.clone(), balances, DetectorSettings::from(&config));

    let feed = EthersChainFeed::new(
        provider,
        registry.watched_addresses(),
        config.poll_interval,
        None,
    );
    let init_block = match config.start_block {
        Some(block) => block,
        None => feed.head_block().await?,
    };

    match load_snapshot(&config.snapshot_path) {
        Ok(Some(previous)) => {
            info!("📂 Previous run initialized at block {}", previous.block);
            for (key, value) in &previous.values {
                info!("   ├─ {}: {}", key, value);
            }
            info!("   └─ Taken at {}", previous.timestamp.to_rfc3339());
        }
        Ok(None) => {}
        Err(e) => warn!("⚠️  Ignoring unreadable snapshot {}: {}", config.snapshot_path, e),
    }

    let values = agent.initialize(init_block).await?;
    info!("✅ Agent initialized at block {} (window {} blocks)", init_block, agent.window_blocks());
    if let Err(e) = save_snapshot(&InitSnapshot::new(init_block, values), &config.snapshot_path) {
        warn!("⚠️  Failed to save initialization snapshot: {}", e);
    }

    let mut sink = create_sink(&config.findings_backend, &config.findings_path)?;
    info!("✅ Findings sink ready ({})", sink.backend_type());

    let feed = feed.starting_at(init_block + 1);
    let (tx, mut rx) = mpsc::channel::<FeedMessage>(FEED_CHANNEL_BUFFER);
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed.run(tx).await {
            error!("❌ Block feed stopped: {}", e);
        }
    });

    info!("🔄 Press CTRL+C to shutdown gracefully");

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    warn!("⚠️  Block feed closed");
                    break;
                };
                let findings = process_block(&agent, message).await;
                write_findings(sink.as_mut(), &findings).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("");
                info!("⚠️  Received CTRL+C, shutting down...");
                break;
            }
        }
    }

    feed_handle.abort();
    if let Err(e) = sink.flush().await {
        error!("❌ Failed to flush findings: {}", e);
    }

    info!("✅ Huge TX detector stopped");
    Ok(())
}

async fn process_block(agent: &HugeTxAgent, message: FeedMessage) -> Vec<Finding> {
    let mut findings = Vec::new();

    for tx in &message.transactions {
        match agent.handle_transaction(tx) {
            Ok(tx_findings) => findings.extend(tx_findings),
            Err(e) => error!("❌ Transaction {} skipped: {}", format_hash(&tx.hash), e),
        }
    }

    match agent.handle_block(&message.block).await {
        Ok(block_findings) => findings.extend(block_findings),
        Err(e) => warn!("⚠️  Block {} vault check failed: {}", message.block.number, e),
    }

    findings
}

async fn write_findings(sink: &mut dyn FindingSink, findings: &[Finding]) {
    for finding in findings {
        if let Err(e) = sink.write_finding(finding).await {
            error!("❌ Failed to write finding {}: {}", finding.alert_id, e);
        }
    }
}
