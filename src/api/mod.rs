//! HTTP API for health checks and transaction submission

use crate::config::ApiConfig;
use crate::error::RelayerResult;
use crate::rpc::{Commitment, SubmissionRpc};
use crate::tx::{preflight, ConfirmationOutcome, SubmissionCoordinator, SubmittedTransaction};

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SubmissionCoordinator>,
    pub rpc: Arc<dyn SubmissionRpc>,
    pub permits: Arc<Semaphore>,
    pub explorer_url: String,
}

impl AppState {
    pub fn new(
        coordinator: Arc<SubmissionCoordinator>,
        rpc: Arc<dyn SubmissionRpc>,
        max_concurrent_submissions: usize,
        explorer_url: String,
    ) -> Self {
        Self {
            coordinator,
            rpc,
            permits: Arc::new(Semaphore::new(max_concurrent_submissions)),
            explorer_url,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/transactions", post(submit_transaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server until `shutdown` fires
pub async fn run_server(
    config: ApiConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> RelayerResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - the RPC node answers
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.rpc.get_block_height(Commitment::Confirmed).await {
        Ok(height) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                block_height: Some(height),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    block_height: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Submit a signed transaction and hold the request until a terminal outcome
async fn submit_transaction(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    let bytes = match BASE64.decode(request.transaction.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            return SubmitResponse::rejected(None, format!("transaction is not valid base64: {}", e))
        }
    };
    let transaction = match SubmittedTransaction::from_wire(bytes, request.last_valid_block_height)
    {
        Ok(tx) => match request.blockhash {
            Some(blockhash) => tx.with_blockhash(blockhash),
            None => tx,
        },
        Err(e) => return SubmitResponse::rejected(None, e.to_string()),
    };
    let signature = transaction.signature().to_string();

    let _permit = match state.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(SubmitResponse::Failed {
                    signature: Some(signature),
                    error: "relayer is shutting down".to_string(),
                }),
            )
        }
    };

    let simulate = request
        .simulate
        .unwrap_or(state.coordinator.config().simulate_before_submit);
    if simulate {
        if let Err(e) = preflight::screen(state.rpc.as_ref(), &transaction).await {
            let logs = match &e {
                crate::error::SubmitError::SimulationRejected { logs, .. } => logs.clone(),
                _ => Vec::new(),
            };
            let status = if e.is_rejection() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::BAD_GATEWAY
            };
            return (
                status,
                Json(SubmitResponse::Rejected {
                    signature: Some(signature),
                    error: e.to_string(),
                    logs,
                }),
            );
        }
    }

    match state.coordinator.submit_and_confirm(transaction).await {
        ConfirmationOutcome::Confirmed(details) => (
            StatusCode::OK,
            Json(SubmitResponse::Confirmed {
                explorer_url: format!("{}/{}", state.explorer_url.trim_end_matches('/'), signature),
                signature,
                slot: details.slot,
                source: details.source.as_str().to_string(),
                execution_error: details.err,
            }),
        ),
        ConfirmationOutcome::NotConfirmed => (
            StatusCode::OK,
            Json(SubmitResponse::NotConfirmed { signature }),
        ),
        ConfirmationOutcome::Failed(e) => (
            StatusCode::BAD_GATEWAY,
            Json(SubmitResponse::Failed {
                signature: Some(signature),
                error: e.to_string(),
            }),
        ),
    }
}

// Request / response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Base64 wire transaction, already signed
    pub transaction: String,
    pub blockhash: Option<String>,
    pub last_valid_block_height: u64,
    pub simulate: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    Confirmed {
        signature: String,
        slot: u64,
        source: String,
        /// On-chain execution error; the transaction still landed
        execution_error: Option<Value>,
        explorer_url: String,
    },
    NotConfirmed {
        signature: String,
    },
    Rejected {
        signature: Option<String>,
        error: String,
        logs: Vec<String>,
    },
    Failed {
        signature: Option<String>,
        error: String,
    },
}

impl SubmitResponse {
    fn rejected(signature: Option<String>, error: String) -> (StatusCode, Json<SubmitResponse>) {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SubmitResponse::Rejected {
                signature,
                error,
                logs: Vec::new(),
            }),
        )
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    block_height: Option<u64>,
    error: Option<String>,
}
