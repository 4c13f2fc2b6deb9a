use rdv_common::{FrameError, PeerName};
use thiserror::Error;

/// Errors that can occur while serving a relay connection.
///
/// The `Display` text of the handshake variants is what the offending peer
/// receives before its connection is closed.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The name frame was missing, unreadable, empty or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// Another live session already holds this name.
    #[error("peer name {0} already taken")]
    NameTaken(PeerName),
    /// A destination or message frame could not be read.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// Writing a message to the destination's connection failed.
    #[error("delivery to {dest} failed: {source}")]
    DeliveryFailure {
        /// Name the sender addressed.
        dest: String,
        /// Transport error from the destination's connection.
        source: tungstenite::Error,
    },
    /// A received data frame could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The connection ended before the peer said anything.
    #[error("connection closed")]
    ConnectionClosed,
}

impl RelayError {
    /// Metrics label for a failed handshake.
    #[must_use]
    pub fn handshake_label(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::NameTaken(_) => "name_taken",
            Self::ConnectionClosed => "abandoned",
            _ => "transport",
        }
    }
}
