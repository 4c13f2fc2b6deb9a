use rdv_common::{FrameError, NameError};
use thiserror::Error;

/// Errors raised by [`crate::RelayClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The chosen name would be refused before reaching the relay.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),
    /// The relay answered the handshake with an error text.
    #[error("relay rejected registration: {0}")]
    Rejected(String),
    /// The relay closed the connection before acknowledging the name.
    #[error("relay closed the connection during registration")]
    ClosedDuringHandshake,
    /// A received data frame could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
