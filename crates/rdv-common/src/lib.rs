//! Common types shared by the rendezvous relay server and its peers.
//!
//! This crate provides:
//! - Peer name validation ([`name`])
//! - Classification of WebSocket messages into protocol frames ([`frame`])
//! - Protocol constants ([`types`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod frame;
pub mod name;
pub mod types;

pub use frame::{Frame, FrameError};
pub use name::{NameError, PeerName};
