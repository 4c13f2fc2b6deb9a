use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::error::RelayError;
use crate::registry::PeerRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long in-flight sessions get to finish after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for the relay server.
#[derive(Debug)]
pub struct ServerState {
    /// Names of connected peers and their connections.
    pub registry: Arc<PeerRegistry>,
    /// Runtime server configuration.
    pub config: ServerConfig,
}

impl ServerState {
    /// Create state with an empty registry.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(PeerRegistry::new()),
            config,
        }
    }
}

/// Run the accept loop until the listener fails.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn run(listener: TcpListener, state: Arc<ServerState>) -> Result<(), RelayError> {
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    run_with_shutdown(listener, state, shutdown_rx).await
}

/// Run the accept loop until `shutdown` fires or its sender is dropped.
///
/// On shutdown the listener is closed and in-flight sessions get
/// [`DRAIN_TIMEOUT`] to finish; any still running are then aborted, which
/// unregisters their peers.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn run_with_shutdown(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), RelayError> {
    let local_addr = listener.local_addr().map_err(RelayError::Io)?;
    info!("relay listening on ws://{}{}", local_addr, state.config.path);
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        sessions.spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, state).await {
                                debug!("connection from {} closed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                    }
                }
            }
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("session task panicked: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("shutdown signal received, draining {} sessions", sessions.len());
                break;
            }
        }
    }
    drop(listener);

    let drain = async { while sessions.join_next().await.is_some() {} };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!(
            "drain timeout reached with {} sessions still active",
            sessions.len()
        );
        sessions.shutdown().await;
    }

    info!("relay shut down");
    Ok(())
}
