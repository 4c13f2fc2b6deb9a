use crate::error::RelayError;
use crate::metrics::{counters, gauges};
use crate::registry::{ConnHandle, FrameSink, PeerRegistry};
use crate::router::MessageRouter;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use rdv_common::types::ACK_TOKEN;
use rdv_common::{Frame, PeerName};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tungstenite::Message;

/// Phase of a connection's life. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the peer's name.
    Handshake,
    /// Registered; relaying (destination, body) pairs.
    Active,
    /// Unregistered and closed.
    Closed,
}

/// A peer's hold on its registry entry. Dropping it unregisters the name, so
/// the entry goes away on every exit path, including task cancellation.
struct Registration {
    registry: Arc<PeerRegistry>,
    name: PeerName,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.unregister(self.name.as_str()) {
            gauges::dec_peers_registered();
            info!(peer = %self.name, "peer left");
        }
    }
}

/// Per-connection state machine: naming handshake, then the relay loop.
pub struct ConnectionSession {
    registry: Arc<PeerRegistry>,
    router: MessageRouter,
    max_name_len: usize,
    registration: Option<Registration>,
    state: SessionState,
}

impl ConnectionSession {
    /// Create an unnamed session sharing `registry`.
    #[must_use]
    pub fn new(registry: Arc<PeerRegistry>, max_name_len: usize) -> Self {
        Self {
            router: MessageRouter::new(Arc::clone(&registry)),
            registry,
            max_name_len,
            registration: None,
            state: SessionState::Handshake,
        }
    }

    /// Drive the connection until it ends.
    ///
    /// `rx` and `tx` are the two halves of one framed connection. Returns
    /// `Ok(())` when the peer leaves cleanly.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session: a rejected handshake
    /// ([`RelayError::InvalidName`], [`RelayError::NameTaken`]), an
    /// unreadable frame ([`RelayError::MalformedFrame`]) or a transport error.
    pub async fn run<R, W>(mut self, mut rx: R, tx: W) -> Result<(), RelayError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
        W: Sink<Message, Error = tungstenite::Error> + Send + 'static,
    {
        let handle = Arc::new(ConnHandle::new(tx));

        let result = match self.handshake(&mut rx, &handle).await {
            Ok(name) => {
                self.transition(SessionState::Active);
                let result = self.relay(&mut rx, &name).await;
                if let Err(e) = &result {
                    warn!(peer = %name, error = %e, "session ended");
                }
                result
            }
            Err(e) => Err(e),
        };

        self.close(&handle).await;
        result
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            next != SessionState::Handshake,
            "session cannot re-enter handshake"
        );
        debug!(from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }

    /// Read the name frame, register it and acknowledge.
    ///
    /// The write lock on our own handle is held from before registration until
    /// the ack is out, so a delivery from another peer cannot overtake it.
    async fn handshake<R>(
        &mut self,
        rx: &mut R,
        handle: &Arc<ConnHandle>,
    ) -> Result<PeerName, RelayError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let mut sink = handle.lock().await;

        let name = match self.read_name(rx).await {
            Ok(name) => name,
            Err(RelayError::ConnectionClosed) => {
                counters::handshakes_total("abandoned");
                debug!("connection closed before handshake");
                return Err(RelayError::ConnectionClosed);
            }
            Err(e) => return Err(reject(&mut sink, e).await),
        };

        if let Err(e) = self.registry.register(name.clone(), Arc::clone(handle)) {
            return Err(reject(&mut sink, e).await);
        }
        self.registration = Some(Registration {
            registry: Arc::clone(&self.registry),
            name: name.clone(),
        });
        gauges::inc_peers_registered();

        if let Err(e) = sink.send(Frame::message(ACK_TOKEN)).await {
            warn!(peer = %name, error = %e, "failed to acknowledge registration");
            return Err(RelayError::WebSocket(e));
        }
        counters::handshakes_total("accepted");
        info!(peer = %name, "peer entered");
        Ok(name)
    }

    async fn read_name<R>(&self, rx: &mut R) -> Result<PeerName, RelayError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        match next_payload(rx).await {
            Ok(Some(raw)) => PeerName::parse(raw, self.max_name_len)
                .map_err(|e| RelayError::InvalidName(e.to_string())),
            Ok(None) => Err(RelayError::ConnectionClosed),
            Err(e) => Err(RelayError::InvalidName(format!(
                "error reading peer name: {e}"
            ))),
        }
    }

    /// Read (destination, body) pairs and route them until the peer leaves.
    async fn relay<R>(&mut self, rx: &mut R, name: &PeerName) -> Result<(), RelayError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let dest = match next_payload(rx).await {
                Ok(Some(dest)) => dest,
                Ok(None) => {
                    debug!(peer = %name, "peer closed connection");
                    return Ok(());
                }
                Err(e) => {
                    return Err(RelayError::MalformedFrame(format!(
                        "error reading destination: {e}"
                    )))
                }
            };

            let body = match next_payload(rx).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    return Err(RelayError::MalformedFrame(format!(
                        "connection closed before message body for {dest}"
                    )))
                }
                Err(e) => {
                    return Err(RelayError::MalformedFrame(format!(
                        "error reading message body: {e}"
                    )))
                }
            };

            // A failed delivery is the sender's problem to hear about, but it
            // never ends the sender's session.
            if let Err(e) = self.router.route(name, &dest, &body).await {
                warn!(peer = %name, dest = %dest, error = %e, "delivery failed");
            }
        }
    }

    /// Unregister (if registered), then close the connection.
    async fn close(&mut self, handle: &ConnHandle) {
        self.transition(SessionState::Closed);
        drop(self.registration.take());
        if let Err(e) = handle.close().await {
            debug!(error = %e, "error closing connection");
        }
    }
}

/// Report a handshake failure to the peer and close its connection.
async fn reject(sink: &mut FrameSink, err: RelayError) -> RelayError {
    counters::handshakes_total(err.handshake_label());
    warn!(error = %err, "handshake rejected");
    if let Err(e) = sink.send(Frame::message(err.to_string())).await {
        debug!(error = %e, "failed to send rejection");
    }
    let _ = sink.close().await;
    err
}

/// Next protocol payload, skipping control frames. `Ok(None)` means the peer
/// went away, either with a close frame or by dropping the connection.
async fn next_payload<R>(rx: &mut R) -> Result<Option<String>, RelayError>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = match rx.next().await {
            None => return Ok(None),
            Some(Err(e)) if is_disconnect(&e) => return Ok(None),
            Some(msg) => msg?,
        };
        match Frame::from_message(msg)? {
            Frame::Payload(payload) => return Ok(Some(payload)),
            Frame::Control => continue,
            Frame::End => return Ok(None),
        }
    }
}

fn is_disconnect(err: &tungstenite::Error) -> bool {
    use tungstenite::error::ProtocolError;
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}
