//! Rendezvous relay server: named peers over WebSocket, best-effort routing.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// CLI argument parsing and server configuration.
pub mod config;
mod connection;
/// Error types for relay server operations.
pub mod error;
/// Prometheus metrics collection and HTTP endpoint.
pub mod metrics;
/// Name → connection table of registered peers.
pub mod registry;
/// Lookup-and-deliver path for routed messages.
pub mod router;
/// Accept loop and shared server state.
pub mod server;
/// Per-connection handshake and relay loop.
pub mod session;

pub use server::{run, run_with_shutdown, ServerState};
