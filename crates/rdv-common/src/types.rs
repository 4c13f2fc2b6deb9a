//! Protocol constants for the rendezvous relay.

/// Token sent by the relay once a peer's name has been registered.
pub const ACK_TOKEN: &str = "OK";

/// Path at which the relay accepts WebSocket upgrades.
pub const DEFAULT_PATH: &str = "/enter";

/// Default relay port.
pub const DEFAULT_PORT: u16 = 12345;

/// Default upper bound on the byte length of a peer name.
pub const DEFAULT_MAX_NAME_LEN: usize = 256;
