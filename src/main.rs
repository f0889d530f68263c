//! txlander - reliable Solana transaction submission relayer
//!
//! Accepts signed transactions over HTTP, broadcasts them with redundant
//! resends and tracks each one until it confirms or its blockhash expires.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use txlander::api;
use txlander::config::Settings;
use txlander::metrics::MetricsServer;
use txlander::rpc::{RpcClient, SubmissionRpc};
use txlander::tx::SubmissionCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting txlander v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        instance_id = %settings.relayer.instance_id,
        rpc = %settings.rpc.http_url,
        "Loaded configuration"
    );

    // RPC client shared by every submission
    let rpc: Arc<dyn SubmissionRpc> = Arc::new(RpcClient::new(&settings.rpc)?);

    let coordinator = Arc::new(SubmissionCoordinator::new(
        rpc.clone(),
        settings.submission.clone(),
    ));
    info!(
        resend_interval_ms = settings.submission.resend_interval_ms,
        poll_interval_ms = settings.submission.poll_interval_ms,
        expiry_margin_blocks = settings.submission.expiry_margin_blocks,
        commitment = %settings.submission.commitment,
        "Submission coordinator initialized"
    );

    let shutdown = CancellationToken::new();

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start API server
    let state = api::AppState::new(
        coordinator,
        rpc,
        settings.relayer.max_concurrent_submissions,
        settings.api.explorer_url.clone(),
    );
    let permits = state.permits.clone();
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = api::run_server(config, state, shutdown).await {
                error!("API server error: {}", e);
            }
        }
    });

    info!("txlander is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, draining in-flight submissions...");
    // Requests still queued for a submission slot are turned away
    permits.close();
    shutdown.cancel();

    if let Err(e) = api_handle.await {
        error!("API task panicked: {}", e);
    }
    if let Some(h) = metrics_handle {
        if let Err(e) = h.await {
            error!("Metrics task panicked: {}", e);
        }
    }

    info!("txlander stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,txlander=debug,hyper=warn,reqwest=warn"));

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
