#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use rdv_common::types::ACK_TOKEN;
use rdvs::config::ServerConfig;
use rdvs::server::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tungstenite::Message;

pub fn test_config(listen: SocketAddr) -> ServerConfig {
    ServerConfig {
        listen,
        path: "/enter".to_string(),
        metrics_addr: "127.0.0.1:0".parse().unwrap(),
        max_name_len: 64,
        max_message_size: 1 << 20,
    }
}

pub struct TestPeer {
    pub ws_tx: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    pub ws_rx: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl TestPeer {
    /// Open a WebSocket to the relay without saying anything yet.
    pub async fn open(addr: &SocketAddr) -> Self {
        let url = format!("ws://{addr}/enter");
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (ws_tx, ws_rx) = ws.split();
        Self { ws_tx, ws_rx }
    }

    /// Open a connection and register `name`, asserting the ack.
    pub async fn connect(addr: &SocketAddr, name: &str) -> Self {
        let mut peer = Self::open(addr).await;
        peer.send_frame(name).await;
        let reply = peer.recv().await;
        assert_eq!(reply, ACK_TOKEN, "registration of {name} failed: {reply}");
        peer
    }

    pub async fn send_frame(&mut self, payload: &str) {
        self.ws_tx
            .send(Message::Text(payload.to_string()))
            .await
            .unwrap();
    }

    pub async fn send(&mut self, dest: &str, body: &str) {
        self.send_frame(dest).await;
        self.send_frame(body).await;
    }

    /// Next text frame, or `None` once the relay closes the connection.
    pub async fn recv_or_closed(&mut self) -> Option<String> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.ws_rx.next())
                .await
                .expect("timeout waiting for frame");
            match msg {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(other)) => panic!("expected text frame, got {other:?}"),
            }
        }
    }

    pub async fn recv(&mut self) -> String {
        self.recv_or_closed()
            .await
            .expect("connection closed while waiting for frame")
    }

    /// `None` if nothing arrives within `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.recv_or_closed())
            .await
            .ok()
            .flatten()
    }

    pub async fn close(mut self) {
        let _ = self.ws_tx.close().await;
    }
}

pub async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::new(test_config(addr)));

    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) = rdvs::run(listener, state_clone).await {
            eprintln!("server error in test: {e}");
        }
    });

    (addr, state)
}

pub async fn start_server_with_shutdown() -> (
    SocketAddr,
    Arc<ServerState>,
    watch::Sender<()>,
    JoinHandle<()>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::new(test_config(addr)));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let state_clone = state.clone();
    let server = tokio::spawn(async move {
        rdvs::run_with_shutdown(listener, state_clone, shutdown_rx)
            .await
            .unwrap();
    });

    (addr, state, shutdown_tx, server)
}

/// Poll until `cond` holds, failing after a few seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
