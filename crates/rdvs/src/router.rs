use crate::error::RelayError;
use crate::metrics::{counters, histograms};
use crate::registry::PeerRegistry;
use rdv_common::PeerName;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What happened to a routed message that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The body was written to the destination's connection.
    Delivered,
    /// Nobody is registered under the destination name; the message was
    /// dropped and the sender is not told.
    UnknownDestination,
}

/// Forwards message bodies to registered peers.
///
/// The lookup and the write are separate steps: a destination that leaves in
/// between surfaces as a [`RelayError::DeliveryFailure`], not a stale write.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<PeerRegistry>,
}

impl MessageRouter {
    /// Create a router over `registry`.
    #[must_use]
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `body` from `sender` to the peer registered as `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeliveryFailure`] if the destination's connection
    /// rejected the write.
    pub async fn route(
        &self,
        sender: &PeerName,
        dest: &str,
        body: &str,
    ) -> Result<RouteOutcome, RelayError> {
        let Some(handle) = self.registry.lookup(dest) else {
            counters::messages_dropped_total("unknown_destination");
            warn!(peer = %sender, dest, "destination not connected, dropping message");
            return Ok(RouteOutcome::UnknownDestination);
        };

        let start = Instant::now();
        if let Err(source) = handle.send(body).await {
            counters::messages_dropped_total("delivery_failure");
            return Err(RelayError::DeliveryFailure {
                dest: dest.to_string(),
                source,
            });
        }
        histograms::delivery_latency_seconds(start.elapsed().as_secs_f64());
        counters::messages_relayed_total();
        counters::payload_bytes_total(body.len() as u64);
        debug!(peer = %sender, dest, bytes = body.len(), "message delivered");
        Ok(RouteOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnHandle;
    use futures::channel::mpsc;
    use futures::{SinkExt, StreamExt};
    use std::collections::HashSet;
    use tungstenite::Message;

    fn register(
        registry: &PeerRegistry,
        name: &str,
    ) -> (Arc<ConnHandle>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded();
        let handle = Arc::new(ConnHandle::new(
            tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed),
        ));
        registry
            .register(name.parse().unwrap(), Arc::clone(&handle))
            .unwrap();
        (handle, rx)
    }

    fn peer(name: &str) -> PeerName {
        name.parse().unwrap()
    }

    #[tokio::test]
    async fn delivers_body_only() {
        let registry = Arc::new(PeerRegistry::new());
        let (_bob, mut bob_rx) = register(&registry, "Bob");
        let router = MessageRouter::new(Arc::clone(&registry));

        let outcome = router.route(&peer("Alice"), "Bob", "Hello Bob").await.unwrap();

        assert_eq!(outcome, RouteOutcome::Delivered);
        assert_eq!(bob_rx.next().await, Some(Message::Text("Hello Bob".into())));
    }

    #[tokio::test]
    async fn unknown_destination_is_not_an_error() {
        let registry = Arc::new(PeerRegistry::new());
        let (_carol, mut carol_rx) = register(&registry, "Carol");
        let router = MessageRouter::new(Arc::clone(&registry));

        let outcome = router
            .route(&peer("Carol"), "Malcolm", "Who are you?")
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::UnknownDestination);
        assert!(carol_rx.try_next().is_err(), "sender must not be notified");
    }

    #[tokio::test]
    async fn closed_destination_is_delivery_failure() {
        let registry = Arc::new(PeerRegistry::new());
        let (bob, bob_rx) = register(&registry, "Bob");
        drop(bob_rx);
        let router = MessageRouter::new(Arc::clone(&registry));

        let err = router.route(&peer("Alice"), "Bob", "hi").await.unwrap_err();

        assert!(matches!(err, RelayError::DeliveryFailure { ref dest, .. } if dest == "Bob"));
        // the destination's entry is left for its own session to remove
        assert!(registry.contains("Bob"));
        drop(bob);
    }

    #[tokio::test]
    async fn self_delivery_arrives_once() {
        let registry = Arc::new(PeerRegistry::new());
        let (_carol, mut carol_rx) = register(&registry, "Carol");
        let router = MessageRouter::new(Arc::clone(&registry));

        router
            .route(&peer("Carol"), "Carol", "I'm fabulous")
            .await
            .unwrap();

        assert_eq!(
            carol_rx.next().await,
            Some(Message::Text("I'm fabulous".into()))
        );
        assert!(carol_rx.try_next().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_senders_are_serialized() {
        let registry = Arc::new(PeerRegistry::new());
        let (_dest, mut dest_rx) = register(&registry, "Dest");
        let router = MessageRouter::new(Arc::clone(&registry));

        let senders = 32;
        let mut tasks = Vec::new();
        for i in 0..senders {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let body = format!("message {i} {}", "x".repeat(i * 64));
                router
                    .route(&format!("sender-{i}").parse::<PeerName>().unwrap(), "Dest", &body)
                    .await
                    .unwrap();
                body
            }));
        }
        let mut expected = HashSet::new();
        for task in tasks {
            expected.insert(task.await.unwrap());
        }

        let mut received = HashSet::new();
        for _ in 0..senders {
            match dest_rx.next().await {
                Some(Message::Text(body)) => assert!(received.insert(body), "duplicate frame"),
                other => panic!("expected text frame, got {other:?}"),
            }
        }
        assert_eq!(received, expected);
    }
}
