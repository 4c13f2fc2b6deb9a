use crate::registry::PeerRegistry;
use axum::extract::State;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    peers: usize,
}

/// Readiness flag plus a view of the registry for `/ready`.
///
/// Starts not ready; `main` flips it once the relay listener is bound and
/// back when draining.
#[derive(Clone)]
pub struct HealthState {
    ready: Arc<AtomicBool>,
    registry: Arc<PeerRegistry>,
}

impl HealthState {
    /// Create a not-ready health state reporting on `registry`.
    #[must_use]
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            registry,
        }
    }

    /// Mark the relay as accepting peers, or draining.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// Whether the relay is accepting peers.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

fn routes(prometheus: PrometheusHandle, health_state: HealthState) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let prometheus = prometheus.clone();
                async move { prometheus.render() }
            }),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(health_state)
}

/// Serve `/metrics`, `/health` and `/ready` on `addr`.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed or the address
/// cannot be bound.
pub async fn start_metrics_server(
    addr: SocketAddr,
    health_state: HealthState,
) -> anyhow::Result<()> {
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on {}", addr);
    axum::serve(listener, routes(prometheus, health_state)).await?;
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// 503 while starting up or draining; the peer count is reported either way.
async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            peers: state.registry.len(),
        }),
    )
}

/// Registry size gauge.
pub mod gauges {
    /// A peer completed its handshake.
    pub fn inc_peers_registered() {
        metrics::gauge!("rdv_peers_registered").increment(1.0);
    }

    /// A registered peer left.
    pub fn dec_peers_registered() {
        metrics::gauge!("rdv_peers_registered").decrement(1.0);
    }
}

/// Event counters.
pub mod counters {
    /// Record a handshake outcome with the given status label.
    pub fn handshakes_total(status: &'static str) {
        metrics::counter!("rdv_handshakes_total", "status" => status).increment(1);
    }

    /// Increment the relayed-messages counter.
    pub fn messages_relayed_total() {
        metrics::counter!("rdv_messages_relayed_total").increment(1);
    }

    /// Increment the dropped-messages counter with the given reason label.
    pub fn messages_dropped_total(reason: &'static str) {
        metrics::counter!("rdv_messages_dropped_total", "reason" => reason).increment(1);
    }

    /// Record delivered payload bytes.
    pub fn payload_bytes_total(bytes: u64) {
        metrics::counter!("rdv_payload_bytes_total").increment(bytes);
    }
}

/// Latency histograms.
pub mod histograms {
    /// Time spent waiting for and writing to a destination connection.
    pub fn delivery_latency_seconds(value: f64) {
        metrics::histogram!("rdv_delivery_latency_seconds").record(value);
    }
}
