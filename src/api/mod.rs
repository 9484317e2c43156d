//! HTTP API for action invocation, health checks and monitoring

use crate::actions::ActionRegistry;
use crate::chain::ChainRpc;
use crate::error::WalletError;
use crate::wallet::WalletService;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ethers::types::H256;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ApiConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<WalletService>,
    pub registry: Arc<ActionRegistry>,
    pub chain: Arc<dyn ChainRpc>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/v1/wallet", get(get_wallet))
        .route("/v1/actions", get(list_actions))
        .route("/v1/actions/:provider/:action", post(invoke_action))
        .route("/v1/transactions/:hash", get(get_transaction))
        .route("/v1/transactions/:hash/wait", post(wait_for_transaction))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify the chain answers for our account
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let chain_ok = state
        .chain
        .get_transaction_count(state.wallet.get_address())
        .await
        .is_ok();

    if chain_ok {
        crate::metrics::record_health_check();
        (StatusCode::OK, Json(ReadinessResponse { ready: true, chain: true }))
    } else {
        crate::metrics::record_health_check_failure();
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse { ready: false, chain: false }),
        )
    }
}

/// Service status
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let network = state.wallet.get_network();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network_id: network.network_id.clone(),
        chain_id: network.chain_id,
        active_lanes: state.wallet.active_lanes(),
        tracked_transactions: state.wallet.tracked_transactions(),
        providers: state
            .registry
            .list_actions()
            .into_iter()
            .map(|(provider, action)| format!("{}/{}", provider, action.name))
            .collect(),
    })
}

/// Wallet identity and balance
async fn get_wallet(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let balance = state.wallet.get_balance().await?;
    let network = state.wallet.get_network();

    Ok(Json(WalletResponse {
        provider: state.wallet.get_name(),
        address: format!("{:?}", state.wallet.get_address()),
        network_id: network.network_id.clone(),
        chain_id: network.chain_id,
        balance_wei: balance.to_string(),
    }))
}

/// List all registered actions
async fn list_actions(State(state): State<AppState>) -> impl IntoResponse {
    let actions: Vec<ActionResponse> = state
        .registry
        .list_actions()
        .into_iter()
        .map(|(provider, action)| ActionResponse {
            provider,
            name: action.name,
            description: action.description,
        })
        .collect();

    Json(actions)
}

/// Invoke an action by provider and name
async fn invoke_action(
    State(state): State<AppState>,
    Path((provider, action)): Path<(String, String)>,
    Json(args): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .registry
        .invoke(&state.wallet, &provider, &action, args)
        .await?;

    Ok(Json(result))
}

/// Look up the tracked record for a broadcast transaction
async fn get_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = parse_hash(&hash)?;

    match state.wallet.transaction_record(hash) {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError(WalletError::Action(format!(
            "Unknown transaction: {:?}",
            hash
        )))),
    }
}

/// Block until a transaction is mined or the confirmation timeout passes
async fn wait_for_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = parse_hash(&hash)?;
    let record = state.wallet.wait_for_confirmation(hash).await?;
    Ok(Json(record))
}

fn parse_hash(value: &str) -> Result<H256, ApiError> {
    value.parse().map_err(|_| {
        ApiError(WalletError::InvalidArgument(
            "hash is not a valid transaction hash".into(),
        ))
    })
}

/// Wrapper mapping wallet errors onto HTTP responses
struct ApiError(WalletError);

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = error_status(&self.0);
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        });
        (status, body).into_response()
    }
}

fn error_status(err: &WalletError) -> StatusCode {
    match err {
        WalletError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        WalletError::Action(_) => StatusCode::NOT_FOUND,
        WalletError::BroadcastRejected { .. } | WalletError::TransactionFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    chain: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    network_id: String,
    chain_id: u64,
    active_lanes: usize,
    tracked_transactions: usize,
    providers: Vec<String>,
}

#[derive(Serialize)]
struct WalletResponse {
    provider: &'static str,
    address: String,
    network_id: String,
    chain_id: u64,
    balance_wei: String,
}

#[derive(Serialize)]
struct ActionResponse {
    provider: &'static str,
    name: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    retryable: bool,
}
