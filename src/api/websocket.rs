//! WebSocket transport for interactive terminal sessions.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tracing::{debug, trace};

use super::handlers::AppState;
use crate::error::RelayError;
use crate::terminal::{ChannelReceiver, ChannelSender, DuplexChannel};
use crate::Result;

/// WebSocket upgrade handler for `/terminal`.
pub async fn terminal_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.clone();
    let binary = bridge.config().binary_frames;
    ws.on_upgrade(move |socket| async move {
        let report = bridge.run(WsChannel::new(socket, binary)).await;
        debug!(
            session = %report.session_id,
            exit_code = ?report.exit_code,
            "websocket terminal closed"
        );
    })
}

/// An upgraded WebSocket used as a session's remote channel.
///
/// Peer input is accepted as text or binary frames. Output goes out as text
/// frames unless `binary` is set; a multi-byte character split across two
/// PTY reads is held back until it is complete.
pub struct WsChannel {
    socket: WebSocket,
    binary: bool,
}

impl WsChannel {
    pub fn new(socket: WebSocket, binary: bool) -> Self {
        Self { socket, binary }
    }
}

impl DuplexChannel for WsChannel {
    type Sender = WsSender;
    type Receiver = WsReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        let (sink, stream) = self.socket.split();
        (
            WsSender {
                sink,
                binary: self.binary,
                carry: Vec::new(),
                closed: false,
            },
            WsReceiver { stream },
        )
    }
}

pub struct WsSender {
    sink: SplitSink<WebSocket, Message>,
    binary: bool,
    carry: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl ChannelSender for WsSender {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        if self.closed {
            return Err(RelayError::ChannelClosed);
        }
        let message = if self.binary {
            Message::Binary(data.into())
        } else {
            self.carry.extend_from_slice(&data);
            let text = decode_utf8_prefix(&mut self.carry);
            if text.is_empty() {
                return Ok(());
            }
            Message::Text(text.into())
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| RelayError::Channel(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.carry.is_empty() {
            let rest = String::from_utf8_lossy(&self.carry).into_owned();
            self.carry.clear();
            let _ = self.sink.send(Message::Text(rest.into())).await;
        }
        let _ = self.sink.send(Message::Close(None)).await;
        self.sink
            .close()
            .await
            .map_err(|e| RelayError::Channel(e.to_string()))
    }
}

pub struct WsReceiver {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl ChannelReceiver for WsReceiver {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Ok(Some(data.to_vec())),
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "peer sent close frame");
                    return Ok(None);
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Err(RelayError::Channel(e.to_string())),
            }
        }
        Ok(None)
    }
}

/// Take the longest decodable prefix out of `buf`.
///
/// Invalid sequences become U+FFFD. An incomplete sequence at the end stays
/// in `buf` for the next call.
fn decode_utf8_prefix(buf: &mut Vec<u8>) -> String {
    let mut out = String::with_capacity(buf.len());
    loop {
        match std::str::from_utf8(buf) {
            Ok(text) => {
                out.push_str(text);
                buf.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(std::str::from_utf8(&buf[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        buf.drain(..valid + len);
                    }
                    None => {
                        buf.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii() {
        let mut buf = b"a.txt\r\n".to_vec();
        assert_eq!(decode_utf8_prefix(&mut buf), "a.txt\r\n");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_split_character() {
        let euro = "€".as_bytes();
        let mut buf = vec![b'x', euro[0], euro[1]];
        assert_eq!(decode_utf8_prefix(&mut buf), "x");
        assert_eq!(buf, &euro[..2]);

        buf.push(euro[2]);
        buf.push(b'!');
        assert_eq!(decode_utf8_prefix(&mut buf), "€!");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_invalid_bytes_replaced() {
        let mut buf = vec![b'a', 0xff, b'b'];
        assert_eq!(decode_utf8_prefix(&mut buf), "a\u{fffd}b");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_only_partial() {
        let mut buf = vec![0xe2];
        assert_eq!(decode_utf8_prefix(&mut buf), "");
        assert_eq!(buf, vec![0xe2]);
    }
}
