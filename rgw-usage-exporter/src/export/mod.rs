//! Exporter: the sole reader of the metric namespaces.
//!
//! Two independent outputs share the metric KVs: the scrape endpoint reads
//! on every request; the bus publisher reads once per export tick. Neither
//! writes anything.

pub mod publish;
pub mod scrape;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{LabelsConfig, ScrapeConfig};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::store::Store;

#[derive(Clone)]
struct ScrapeState {
    store: Arc<Store>,
    health: Arc<HealthCounters>,
    labels: Arc<LabelsConfig>,
}

async fn metrics_handler(State(state): State<ScrapeState>) -> impl IntoResponse {
    match scrape::render(&state.store, &state.labels, &state.health).await {
        Some(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; version=0.0.4")],
            "aggregation in progress, try again shortly\n".to_string(),
        ),
    }
}

/// Serve `GET /metrics` until `cancel` fires. No other routes — target
/// reachability is exposed as the `target_up` series on `/metrics` itself
/// (see `scrape::render`), not a separate endpoint.
pub async fn serve(
    scrape: &ScrapeConfig,
    labels: LabelsConfig,
    store: Arc<Store>,
    health: Arc<HealthCounters>,
    cancel: CancellationToken,
) -> Result<()> {
    let state = ScrapeState {
        store,
        health,
        labels: Arc::new(labels),
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let addr: SocketAddr = scrape
        .scrape_bind_addr
        .parse()
        .map_err(|e| crate::error::Error::BadConfig(format!("invalid scrape_bind_addr: {e}")))?;

    tracing::info!(%addr, "scrape endpoint listening");
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::Error::BadConfig(format!("failed to bind {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::BadConfig(format!("scrape server error: {e}")))
}
