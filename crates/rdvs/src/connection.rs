use crate::error::RelayError;
use crate::server::ServerState;
use crate::session::ConnectionSession;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::WebSocketConfig;

/// Refuse upgrades aimed anywhere but the relay endpoint.
fn check_path(req: &Request, resp: Response, path: &str) -> Result<Response, ErrorResponse> {
    if req.uri().path() == path {
        return Ok(resp);
    }
    let mut err = ErrorResponse::new(Some(format!(
        "no relay endpoint at {}",
        req.uri().path()
    )));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}

/// Upgrade one accepted TCP stream and run its session to completion.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), RelayError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(state.config.max_message_size),
        max_frame_size: Some(state.config.max_message_size),
        ..WebSocketConfig::default()
    };

    let path = state.config.path.clone();
    let ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        move |req: &Request, resp: Response| check_path(req, resp, &path),
        Some(ws_config),
    )
    .await
    .map_err(RelayError::WebSocket)?;
    debug!(%peer_addr, "websocket upgrade complete");

    let (ws_tx, ws_rx) = ws_stream.split();
    ConnectionSession::new(Arc::clone(&state.registry), state.config.max_name_len)
        .run(ws_rx, ws_tx)
        .await
}
