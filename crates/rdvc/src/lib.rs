//! Rendezvous relay peer: register a name, send and receive messages.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Client error types.
pub mod error;
/// WebSocket connection to the relay.
pub mod relay;

pub use error::ClientError;
pub use relay::RelayClient;
