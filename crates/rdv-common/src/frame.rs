//! Mapping of WebSocket messages onto relay protocol frames.
//!
//! Every protocol frame is one WebSocket data message carrying a string.
//! Text messages are taken as-is; binary messages are accepted when they hold
//! valid UTF-8. Ping and pong are transport housekeeping and never count as
//! protocol frames.

use thiserror::Error;
use tungstenite::Message;

/// Errors produced when a data message cannot be read as a protocol frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A binary message did not contain valid UTF-8.
    #[error("frame payload is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

/// One received WebSocket message, classified for the relay protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A protocol frame with its string payload.
    Payload(String),
    /// Transport-level control traffic (ping, pong, raw frames).
    Control,
    /// The remote side sent a close frame.
    End,
}

impl Frame {
    /// Classify a received message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NotUtf8`] for binary payloads that are not UTF-8.
    pub fn from_message(msg: Message) -> Result<Self, FrameError> {
        match msg {
            Message::Text(text) => Ok(Self::Payload(text)),
            Message::Binary(data) => Ok(Self::Payload(String::from_utf8(data)?)),
            Message::Close(_) => Ok(Self::End),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Self::Control),
        }
    }

    /// Build the outbound message carrying `payload` as one frame.
    #[must_use]
    pub fn message(payload: impl Into<String>) -> Message {
        Message::Text(payload.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_payload() {
        let frame = Frame::from_message(Message::Text("Hello Bob".into())).unwrap();
        assert_eq!(frame, Frame::Payload("Hello Bob".into()));
    }

    #[test]
    fn utf8_binary_is_payload() {
        let frame = Frame::from_message(Message::Binary(b"Carol".to_vec())).unwrap();
        assert_eq!(frame, Frame::Payload("Carol".into()));
    }

    #[test]
    fn invalid_binary_is_rejected() {
        let err = Frame::from_message(Message::Binary(vec![0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, FrameError::NotUtf8(_)));
    }

    #[test]
    fn ping_and_pong_are_control() {
        assert_eq!(
            Frame::from_message(Message::Ping(vec![1])).unwrap(),
            Frame::Control
        );
        assert_eq!(
            Frame::from_message(Message::Pong(vec![])).unwrap(),
            Frame::Control
        );
    }

    #[test]
    fn close_is_end() {
        assert_eq!(Frame::from_message(Message::Close(None)).unwrap(), Frame::End);
    }

    #[test]
    fn empty_text_is_still_a_payload() {
        assert_eq!(
            Frame::from_message(Message::Text(String::new())).unwrap(),
            Frame::Payload(String::new())
        );
    }

    #[test]
    fn message_builds_text() {
        assert_eq!(Frame::message("OK"), Message::Text("OK".into()));
    }
}
