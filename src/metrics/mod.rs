//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission pipeline throughput and failures by stage
//! - Remote signer poll counts and wait times
//! - Confirmation outcomes and latency

use axum::{routing::get, Router};
use ethers::types::Address;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Submission pipeline metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "agent_wallet_transactions_submitted_total",
        "Total submissions entering an account lane",
        &["account"]
    ).unwrap();

    pub static ref TX_BROADCAST: CounterVec = register_counter_vec!(
        "agent_wallet_transactions_broadcast_total",
        "Total transactions accepted by the network",
        &["account"]
    ).unwrap();

    pub static ref TX_STAGE_FAILURES: CounterVec = register_counter_vec!(
        "agent_wallet_transaction_failures_total",
        "Submission failures by pipeline stage",
        &["account", "stage"]
    ).unwrap();

    // Remote signer metrics
    pub static ref SIGNER_POLLS: CounterVec = register_counter_vec!(
        "agent_wallet_signer_polls_total",
        "Total status polls against the remote signer",
        &[]
    ).unwrap();

    pub static ref SIGNER_WAIT: HistogramVec = register_histogram_vec!(
        "agent_wallet_signer_wait_seconds",
        "Time from signature request to terminal ticket state",
        &[],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Confirmation metrics
    pub static ref CONFIRMATIONS: CounterVec = register_counter_vec!(
        "agent_wallet_confirmations_total",
        "Confirmation wait outcomes",
        &["outcome"]
    ).unwrap();

    pub static ref CONFIRMATION_WAIT: HistogramVec = register_histogram_vec!(
        "agent_wallet_confirmation_wait_seconds",
        "Time from broadcast to mined receipt",
        &[],
        vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "agent_wallet_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: CounterVec = register_counter_vec!(
        "agent_wallet_health_check_failure_total",
        "Total failed health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

// Helper functions to record metrics

pub fn record_submission(account: Address) {
    TX_SUBMITTED
        .with_label_values(&[&format!("{:?}", account)])
        .inc();
}

pub fn record_broadcast(account: Address) {
    TX_BROADCAST
        .with_label_values(&[&format!("{:?}", account)])
        .inc();
}

pub fn record_stage_failure(account: Address, stage: &str) {
    TX_STAGE_FAILURES
        .with_label_values(&[&format!("{:?}", account), stage])
        .inc();
}

pub fn record_signer_poll() {
    SIGNER_POLLS.with_label_values(&[]).inc();
}

pub fn observe_signer_wait(seconds: f64) {
    SIGNER_WAIT.with_label_values(&[]).observe(seconds);
}

pub fn record_confirmation(outcome: &str) {
    CONFIRMATIONS.with_label_values(&[outcome]).inc();
}

pub fn observe_confirmation_wait(seconds: f64) {
    CONFIRMATION_WAIT.with_label_values(&[]).observe(seconds);
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.with_label_values(&[]).inc();
}
