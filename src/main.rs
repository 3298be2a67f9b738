use std::fs;
use std::sync::Arc;

use clap::Parser;
use ethers::prelude::*;
use ethers::types::{Bytes, U256};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod chain;
mod config;
mod confirmer;
mod database;
mod error;
mod gate;
mod interrupt;
mod metrics;
mod publisher;
mod status;
mod submitter;

use chain::{EthersChainClient, Rollup, RollupId};
use config::{ParsedConfig, PublisherConfig};
use database::LoggingRollupDatabase;
use metrics::LoggingMetrics;
use publisher::{PublishOutcome, Publisher, PublisherSettings};

/// Submits one locally-aggregated rollup to L1 and exits.
///
/// This binary is a thin demonstration harness around the `Publisher`
/// state machine; a real sequencer embeds `Publisher` directly and
/// drives repeated `publish` calls against its own rollup queue.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML file overlaying `PublisherConfig`'s defaults.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Opaque identifier reported to the rollup database.
    #[arg(long)]
    rollup_id: String,

    /// Path to the raw rollup-proof payload bytes.
    #[arg(long)]
    proof: String,

    /// Path to a raw broadcast-data payload. Repeatable; order is
    /// preserved and becomes the nonce-assignment order (§3).
    #[arg(long = "broadcast")]
    broadcast_data: Vec<String>,

    /// Uniform gas estimate passed to the gas/balance gate and sized
    /// against the configured fee ceiling.
    #[arg(long)]
    estimated_gas: u64,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let cli = Cli::parse();

    info!("═══════════════════════════════════════════");
    info!("    ROLLUP PUBLISHER");
    info!("═══════════════════════════════════════════");

    let config = PublisherConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, path = %cli.config, "failed to load config file, using defaults");
        PublisherConfig::default()
    });
    let parsed = ParsedConfig::from_config(&config)?;

    info!(
        max_fee_gwei = %ethers::utils::format_units(parsed.max_fee_per_gas, "gwei")?,
        max_priority_fee_gwei = %ethers::utils::format_units(parsed.max_priority_fee_per_gas, "gwei")?,
        gas_limit = %parsed.gas_limit,
        rollup_contract = ?parsed.rollup_contract,
        "configuration loaded"
    );

    let private_key = std::env::var("PRIVATE_KEY").expect("PRIVATE_KEY environment variable required");
    let wallet: LocalWallet = private_key.parse()?;

    let provider = Provider::<Http>::try_from(parsed.rpc_url.as_str())?;
    let chain_id = provider.get_chainid().await?.as_u64();
    let wallet = wallet.with_chain_id(chain_id);
    info!(signer = ?wallet.address(), chain_id, "wallet loaded");

    let client = Arc::new(SignerMiddleware::new(provider, wallet));
    let chain_client: Arc<dyn chain::ChainClient> =
        Arc::new(EthersChainClient::new(client, parsed.rollup_contract));

    let settings = PublisherSettings {
        max_fee_per_gas: parsed.max_fee_per_gas,
        max_priority_fee_per_gas: parsed.max_priority_fee_per_gas,
        gas_limit: parsed.gas_limit,
        poll_interval: std::time::Duration::from_secs(parsed.poll_interval_secs),
        receipt_timeout: std::time::Duration::from_secs(parsed.receipt_timeout_secs),
    };

    let publisher = Arc::new(Publisher::new(
        chain_client,
        Arc::new(LoggingRollupDatabase),
        Arc::new(LoggingMetrics),
        settings,
    ));

    // Cooperative cancellation: Ctrl-C raises the interrupt flag
    // instead of killing the process, so any in-progress send/poll
    // completes naturally and the publisher unwinds to Aborted (§4.5).
    let interrupt_publisher = publisher.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, requesting publisher shutdown");
            interrupt_publisher.interrupt();
        }
    });

    let rollup = Rollup {
        id: RollupId::from(cli.rollup_id),
        proof: read_payload(&cli.proof)?,
        signatures: Vec::new(),
        offchain_data: cli
            .broadcast_data
            .iter()
            .map(|path| read_payload(path))
            .collect::<eyre::Result<Vec<Bytes>>>()?,
    };

    let outcome = publisher.publish(rollup, U256::from(cli.estimated_gas)).await;

    match outcome {
        PublishOutcome::Published => {
            info!("publish complete");
            Ok(())
        }
        PublishOutcome::Aborted => {
            error!("publish aborted, see log above for cause");
            std::process::exit(1);
        }
    }
}

fn read_payload(path: &str) -> eyre::Result<Bytes> {
    let bytes = fs::read(path)?;
    Ok(Bytes::from(bytes))
}
