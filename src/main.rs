//! Agent Wallet - onchain action service for automated agents
//!
//! Owns one account whose keys live in a remote signing service, and exposes
//! wallet actions over HTTP. Transactions are serialized per account through
//! nonce-ordered submission lanes; receipt confirmation runs independently.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod actions;
mod api;
mod chain;
mod config;
mod confirm;
mod error;
mod metrics;
mod network;
mod signer;
#[cfg(test)]
mod testutil;
mod tx;
mod wallet;

use actions::{ActionRegistry, WalletActionProvider};
use chain::{ChainProvider, ChainRpc};
use config::Settings;
use confirm::ReceiptConfirmer;
use metrics::MetricsServer;
use signer::{HttpSigner, SignaturePoller};
use tx::{SubmissionQueue, TransactionBuilder};
use wallet::WalletService;

/// How often terminal confirmation records are pruned
const PRUNE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Agent Wallet v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    info!(
        "Instance {} on {} (chain {})",
        settings.service.instance_id, settings.chain.network_id, settings.chain.chain_id
    );

    let address = settings
        .wallet
        .address
        .parse()
        .context("Invalid wallet address")?;
    let net = network::network_from_id(&settings.chain.network_id)
        .context("Unknown network id")?;

    // Construct everything once and inject; no component reaches for a
    // hidden global
    let chain: Arc<dyn ChainRpc> = Arc::new(ChainProvider::new(settings.chain.clone())?);
    info!("Chain provider initialized ({} RPC urls)", settings.chain.rpc_urls.len());

    let remote_signer = Arc::new(HttpSigner::new(&settings.signer)?);
    let poller = Arc::new(SignaturePoller::new(
        remote_signer,
        settings.signer.poll_interval(),
        settings.signer.max_polls,
    ));

    let builder = Arc::new(TransactionBuilder::new(chain.clone()));
    let confirmer = Arc::new(ReceiptConfirmer::new(
        chain.clone(),
        settings.chain.confirmation_poll_interval(),
    ));
    let queue = Arc::new(SubmissionQueue::new(
        chain.clone(),
        builder,
        poller.clone(),
        confirmer.clone(),
    ));

    let wallet_service = Arc::new(WalletService::new(
        address,
        net.clone(),
        chain.clone(),
        queue,
        poller,
        confirmer.clone(),
        settings.chain.confirmation_timeout(),
    ));

    let mut registry = ActionRegistry::new(net);
    registry.register(Arc::new(WalletActionProvider));
    let registry = Arc::new(registry);

    // Start API server
    let api_handle = tokio::spawn({
        let state = api::AppState {
            wallet: wallet_service.clone(),
            registry: registry.clone(),
            chain: chain.clone(),
        };
        let api_config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(api_config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Periodically drop terminal confirmation records
    let prune_handle = tokio::spawn({
        let confirmer = confirmer.clone();
        async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(PRUNE_INTERVAL_SECS));
            loop {
                interval.tick().await;
                confirmer.prune(chrono::Duration::hours(1));
            }
        }
    });

    info!("Agent Wallet is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    prune_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Agent Wallet stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,agent_wallet=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
