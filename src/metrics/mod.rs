//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission outcomes and latency
//! - Initial and resend broadcasts
//! - Simulation rejections
//! - In-flight submissions

use crate::error::{RelayerError, RelayerResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

lazy_static! {
    // Submission metrics
    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "txlander_submissions_total",
        "Total submissions by terminal outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SUBMISSION_LATENCY: HistogramVec = register_histogram_vec!(
        "txlander_submission_latency_seconds",
        "Time from initial broadcast to terminal outcome",
        &["outcome"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0, 120.0]
    ).unwrap();

    pub static ref SUBMISSIONS_INFLIGHT: Gauge = register_gauge!(
        "txlander_submissions_inflight",
        "Submissions currently being tracked"
    ).unwrap();

    // Broadcast metrics
    pub static ref BROADCASTS: CounterVec = register_counter_vec!(
        "txlander_broadcasts_total",
        "Total broadcasts by kind and result",
        &["kind", "result"]
    ).unwrap();

    // Simulation metrics
    pub static ref SIMULATION_REJECTIONS: CounterVec = register_counter_vec!(
        "txlander_simulation_rejections_total",
        "Transactions rejected by pre-submission simulation",
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

    pub async fn run(&self, shutdown: CancellationToken) -> RelayerResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Text exposition of every registered metric
pub fn render() -> RelayerResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| RelayerError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| RelayerError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_submission_outcome(outcome: &str) {
    SUBMISSIONS.with_label_values(&[outcome]).inc();
}

pub fn record_submission_latency(outcome: &str, latency_secs: f64) {
    SUBMISSION_LATENCY
        .with_label_values(&[outcome])
        .observe(latency_secs);
}

pub fn record_broadcast(kind: &str, ok: bool) {
    BROADCASTS
        .with_label_values(&[kind, if ok { "ok" } else { "error" }])
        .inc();
}

pub fn record_simulation_rejected() {
    SIMULATION_REJECTIONS.with_label_values(&[]).inc();
}

/// Counts a submission as in flight until dropped
pub struct InflightGuard;

impl InflightGuard {
    pub fn new() -> Self {
        SUBMISSIONS_INFLIGHT.inc();
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        SUBMISSIONS_INFLIGHT.dec();
    }
}
