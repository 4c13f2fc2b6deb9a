use clap::Parser;
use rdv_common::types::{DEFAULT_MAX_NAME_LEN, DEFAULT_PATH};
use std::net::SocketAddr;

/// Largest name limit the relay will accept.
const MAX_ALLOWED_NAME_LEN: usize = 65_536;
/// Largest message limit the relay will accept (1 GiB).
const MAX_ALLOWED_MESSAGE_SIZE: usize = 1 << 30;

/// CLI arguments for the relay server.
#[derive(Parser, Debug, Clone)]
#[command(name = "rdvs")]
#[command(about = "Rendezvous relay server")]
#[command(version)]
pub struct Args {
    /// Socket address to listen on.
    #[arg(long, default_value = "0.0.0.0:12345", env = "RDVS_LISTEN")]
    pub listen: SocketAddr,
    /// URL path at which WebSocket upgrades are accepted.
    #[arg(long, default_value = DEFAULT_PATH, env = "RDVS_PATH")]
    pub path: String,
    /// Socket address for the metrics and health endpoints.
    #[arg(long, default_value = "127.0.0.1:9090", env = "RDVS_METRICS")]
    pub metrics_addr: SocketAddr,
    /// Maximum peer name length in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_NAME_LEN, env = "RDVS_MAX_NAME_LEN")]
    pub max_name_len: usize,
    /// Maximum size of a single WebSocket message in bytes.
    #[arg(long, default_value = "67108864", env = "RDVS_MAX_MESSAGE_SIZE")]
    pub max_message_size: usize,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: SocketAddr,
    /// URL path at which WebSocket upgrades are accepted.
    pub path: String,
    /// Socket address for the metrics and health endpoints.
    pub metrics_addr: SocketAddr,
    /// Maximum peer name length in bytes.
    pub max_name_len: usize,
    /// Maximum size of a single WebSocket message in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("path must start with '/': {:?}", self.path));
        }

        if self.max_name_len == 0 {
            return Err("max_name_len must be greater than 0".to_string());
        }
        if self.max_name_len > MAX_ALLOWED_NAME_LEN {
            return Err(format!(
                "max_name_len exceeds maximum allowed ({} bytes)",
                MAX_ALLOWED_NAME_LEN
            ));
        }

        // A name is itself a message, so the message limit must admit it
        if self.max_message_size < self.max_name_len {
            return Err("max_message_size cannot be smaller than max_name_len".to_string());
        }
        if self.max_message_size > MAX_ALLOWED_MESSAGE_SIZE {
            return Err(format!(
                "max_message_size exceeds maximum allowed ({} bytes)",
                MAX_ALLOWED_MESSAGE_SIZE
            ));
        }

        if self.listen == self.metrics_addr {
            return Err("metrics_addr must differ from listen".to_string());
        }
        Ok(())
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            path: args.path,
            metrics_addr: args.metrics_addr,
            max_name_len: args.max_name_len,
            max_message_size: args.max_message_size,
        }
    }
}
