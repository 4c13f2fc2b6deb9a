use crate::error::ClientError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rdv_common::types::ACK_TOKEN;
use rdv_common::{Frame, PeerName};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A registered peer connection.
pub struct RelayClient {
    ws_tx: SplitSink<WsStream, Message>,
    ws_rx: SplitStream<WsStream>,
    name: PeerName,
}

impl RelayClient {
    /// Connect to the relay at `url` and register as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with the relay's explanation if the
    /// name is refused, or a transport error if the connection fails.
    pub async fn connect(url: &str, name: &str) -> Result<Self, ClientError> {
        let name: PeerName = name.parse()?;
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        ws_tx.send(Frame::message(name.as_str())).await?;
        match next_payload(&mut ws_rx).await? {
            Some(reply) if reply == ACK_TOKEN => {
                debug!(peer = %name, "registered with relay");
                Ok(Self { ws_tx, ws_rx, name })
            }
            Some(reply) => Err(ClientError::Rejected(reply)),
            None => Err(ClientError::ClosedDuringHandshake),
        }
    }

    /// Name this client registered under.
    #[must_use]
    pub fn name(&self) -> &PeerName {
        &self.name
    }

    /// Send `body` to the peer registered as `dest`. The relay gives no
    /// feedback when `dest` is unknown.
    ///
    /// # Errors
    ///
    /// Returns a transport error if either frame could not be written.
    pub async fn send(&mut self, dest: &str, body: &str) -> Result<(), ClientError> {
        self.ws_tx.send(Frame::message(dest)).await?;
        self.ws_tx.send(Frame::message(body)).await?;
        Ok(())
    }

    /// Wait for the next message addressed to this peer. `Ok(None)` once the
    /// relay has closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable frame.
    pub async fn recv(&mut self) -> Result<Option<String>, ClientError> {
        next_payload(&mut self.ws_rx).await
    }

    /// Leave the relay.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the close frame could not be sent.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws_tx.close().await?;
        Ok(())
    }
}

async fn next_payload(ws_rx: &mut SplitStream<WsStream>) -> Result<Option<String>, ClientError> {
    while let Some(msg) = ws_rx.next().await {
        match Frame::from_message(msg?)? {
            Frame::Payload(payload) => return Ok(Some(payload)),
            Frame::Control => {}
            Frame::End => return Ok(None),
        }
    }
    Ok(None)
}
