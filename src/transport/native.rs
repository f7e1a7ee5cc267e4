//! Live transport — `tokio-tungstenite`.
//!
//! [`connect`] opens the socket, performs the broker handshake and returns a
//! [`NativeTransport`] whose halves carry raw text frames. WS-level pings are
//! answered by the reader; a close frame reads as end of stream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{FrameReader, FrameWriter, Transport};
use crate::error::TransportError;
use crate::network;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = Arc<Mutex<SplitSink<WsStream, Message>>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected, handshaken socket.
pub struct NativeTransport {
    sink: Sink,
    stream: SplitStream<WsStream>,
}

/// Body of the `connect` handshake frame.
pub fn connect_message(locale: &str) -> String {
    let info = serde_json::json!({
        "locale": locale,
        "platformId": network::PLATFORM_ID,
        "platformVersion": network::PLATFORM_VERSION,
        "clientId": network::CLIENT_ID,
        "clientVersion": network::CLIENT_VERSION,
    });
    format!("connect {} {}", network::CONNECT_PROTOCOL_VERSION, info)
}

/// Open `url` and complete the handshake.
pub async fn connect(url: &str, locale: &str) -> Result<NativeTransport, TransportError> {
    let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| TransportError::ConnectionFailed("connection timeout".into()))?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let (mut sink, mut stream) = ws_stream.split();

    sink.send(Message::Text(connect_message(locale).into()))
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let text: &str = text.as_ref();
                if text == network::CONNECTED_REPLY {
                    break;
                }
                return Err(TransportError::Handshake(format!(
                    "unexpected handshake reply `{}`",
                    text
                )));
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = sink.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = extract_close(frame.as_ref());
                return Err(TransportError::Closed {
                    code: Some(code),
                    reason,
                });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
            None => return Err(TransportError::Handshake("stream ended".into())),
        }
    }

    tracing::info!("Connected to {}", url);
    Ok(NativeTransport {
        sink: Arc::new(Mutex::new(sink)),
        stream,
    })
}

impl Transport for NativeTransport {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        (
            Box::new(NativeReader {
                stream: self.stream,
                sink: Arc::clone(&self.sink),
            }),
            Box::new(NativeWriter { sink: self.sink }),
        )
    }
}

struct NativeReader {
    stream: SplitStream<WsStream>,
    sink: Sink,
}

struct NativeWriter {
    sink: Sink,
}

#[async_trait]
impl FrameReader for NativeReader {
    async fn read(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_string())),
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.sink.lock().await.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = extract_close(frame.as_ref());
                    tracing::info!("WebSocket closed by server: {} {}", code, reason);
                    return Ok(None);
                }
                Some(Ok(_)) => {} // Binary, Pong, Frame
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl FrameWriter for NativeWriter {
    async fn write(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "Client disconnect".into(),
            })))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}
