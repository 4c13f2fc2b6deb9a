use crate::error::RelayError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{Sink, SinkExt};
use rdv_common::{Frame, PeerName};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tungstenite::Message;

/// Write half of a peer connection, type-erased so the registry does not
/// depend on the concrete transport.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Lockable handle over one peer's outbound connection.
///
/// The mutex admits one frame write at a time, so concurrent deliveries to the
/// same peer never interleave.
pub struct ConnHandle {
    sink: Mutex<FrameSink>,
}

impl ConnHandle {
    /// Wrap the write half of a connection.
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = tungstenite::Error> + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::pin(sink)),
        }
    }

    /// Take the write lock. Held across a multi-frame exchange (the handshake
    /// reply) so nothing else is written in between.
    pub async fn lock(&self) -> MutexGuard<'_, FrameSink> {
        self.sink.lock().await
    }

    /// Write `payload` as a single frame under the write lock.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the frame could not be written.
    pub async fn send(&self, payload: &str) -> Result<(), tungstenite::Error> {
        let mut sink = self.sink.lock().await;
        sink.send(Frame::message(payload)).await
    }

    /// Close the connection's write half.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the close frame could not be sent.
    pub async fn close(&self) -> Result<(), tungstenite::Error> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}

impl fmt::Debug for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnHandle").finish_non_exhaustive()
    }
}

/// Concurrent name → connection table of registered peers.
///
/// Mutations of one key are exclusive; lookups only take a shard read lock and
/// hand back a clone of the `Arc`, so no registry lock is held while writing
/// to a peer.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<PeerName, Arc<ConnHandle>>,
}

impl PeerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, refusing if it is already held. Never overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NameTaken`] when another peer holds `name`.
    pub fn register(&self, name: PeerName, handle: Arc<ConnHandle>) -> Result<(), RelayError> {
        match self.peers.entry(name) {
            Entry::Occupied(entry) => Err(RelayError::NameTaken(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Look up the handle registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<ConnHandle>> {
        self.peers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove `name` if present. Returns whether an entry was removed; removing
    /// an absent name is not an error.
    pub fn unregister(&self, name: &str) -> bool {
        self.peers.remove(name).is_some()
    }

    /// Whether `name` is currently registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    /// Number of registered peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns `true` if no peer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
