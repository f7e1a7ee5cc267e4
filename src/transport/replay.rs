//! Capture and deterministic replay of server frames.
//!
//! The [`Recorder`] sits between the WS client and a live transport and
//! writes one JSON line per inbound frame. Frames are keyed by the request
//! that produced them (type + parameters, session token removed) and by how
//! many times that same request had been issued, never by correlation id,
//! since ids differ between runs.
//!
//! [`ReplayTransport`] reads such a capture back and answers each `sub` with
//! the recorded frames for its key, re-tagged with the new id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{FrameReader, FrameWriter, Halves, Transport};
use crate::error::TransportError;
use crate::output::{Reader, Writer};
use crate::ws::{FrameCode, MessageOut, RawFrame, RequestId};

/// One recorded inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedFrame {
    pub key: String,
    pub occurrence: usize,
    pub code: FrameCode,
    #[serde(default)]
    pub body: String,
}

/// Canonical key of a subscribe body: sorted JSON without the session token.
pub fn request_key(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("token");
            Value::Object(map).to_string()
        }
        other => other.to_string(),
    }
}

/// Per-key occurrence counter shared by recorder and replay.
#[derive(Debug, Default)]
struct Occurrences {
    seen: HashMap<String, usize>,
}

impl Occurrences {
    fn next(&mut self, key: &str) -> usize {
        let counter = self.seen.entry(key.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

struct RecorderState {
    requests: HashMap<RequestId, (String, usize)>,
    occurrences: Occurrences,
    sink: Box<dyn Writer>,
}

/// Wraps a transport and records every inbound frame to a [`Writer`].
pub struct Recorder<T> {
    inner: T,
    sink: Box<dyn Writer>,
}

impl<T: Transport> Recorder<T> {
    pub fn new(inner: T, sink: impl Writer + 'static) -> Self {
        Self {
            inner,
            sink: Box::new(sink),
        }
    }
}

impl<T: Transport> Transport for Recorder<T> {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        let (reader, writer) = self.inner.split();
        let state = Arc::new(Mutex::new(RecorderState {
            requests: HashMap::new(),
            occurrences: Occurrences::default(),
            sink: self.sink,
        }));
        Halves {
            reader: Box::new(RecordingReader {
                inner: reader,
                state: Arc::clone(&state),
            }),
            writer: Box::new(RecordingWriter {
                inner: writer,
                state,
            }),
        }
        .split()
    }
}

struct RecordingReader {
    inner: Box<dyn FrameReader>,
    state: Arc<Mutex<RecorderState>>,
}

struct RecordingWriter {
    inner: Box<dyn FrameWriter>,
    state: Arc<Mutex<RecorderState>>,
}

fn lock(state: &Mutex<RecorderState>) -> std::sync::MutexGuard<'_, RecorderState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write(&mut self, frame: String) -> Result<(), TransportError> {
        if let Ok(MessageOut::Subscribe { id, body }) = MessageOut::decode(&frame) {
            let key = request_key(&body);
            let mut state = lock(&self.state);
            let occurrence = state.occurrences.next(&key);
            state.requests.insert(id, (key, occurrence));
        }
        self.inner.write(frame).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

#[async_trait]
impl FrameReader for RecordingReader {
    async fn read(&mut self) -> Result<Option<String>, TransportError> {
        let frame = self.inner.read().await?;
        if let Some(text) = &frame {
            if let Ok(raw) = RawFrame::decode(text) {
                let mut state = lock(&self.state);
                if let Some((key, occurrence)) = state.requests.get(&raw.id).cloned() {
                    let captured = CapturedFrame {
                        key,
                        occurrence,
                        code: raw.code,
                        body: raw.text,
                    };
                    match serde_json::to_vec(&captured) {
                        Ok(mut line) => {
                            line.push(b'\n');
                            if let Err(e) = state.sink.write(&line) {
                                tracing::warn!("Failed to record frame for {}: {}", raw.id, e);
                            }
                        }
                        Err(e) => tracing::warn!("Failed to encode captured frame: {}", e),
                    }
                }
            }
        }
        Ok(frame)
    }
}

// ─── Replay ──────────────────────────────────────────────────────────────────

type Exchange = Vec<(FrameCode, String)>;

/// Replays a capture written by [`Recorder`].
pub struct ReplayTransport {
    exchanges: HashMap<(String, usize), Exchange>,
}

impl ReplayTransport {
    /// Load a capture from any [`Reader`].
    pub fn from_reader(reader: &mut dyn Reader) -> Result<Self, TransportError> {
        let bytes = reader
            .read()
            .map_err(|e| TransportError::Fixture(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| TransportError::Fixture(format!("capture is not UTF-8: {}", e)))?;
        Self::parse(&text)
    }

    /// Parse JSON-lines capture text.
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        let mut exchanges: HashMap<(String, usize), Exchange> = HashMap::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let frame: CapturedFrame = serde_json::from_str(line).map_err(|e| {
                TransportError::Fixture(format!("line {}: {}", line_no + 1, e))
            })?;
            exchanges
                .entry((frame.key, frame.occurrence))
                .or_default()
                .push((frame.code, frame.body));
        }
        tracing::debug!("Loaded {} recorded exchange(s)", exchanges.len());
        Ok(Self { exchanges })
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }
}

impl Transport for ReplayTransport {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Box::new(ReplayReader { rx }),
            Box::new(ReplayWriter {
                exchanges: self.exchanges,
                occurrences: Occurrences::default(),
                tx,
            }),
        )
    }
}

struct ReplayReader {
    rx: mpsc::UnboundedReceiver<String>,
}

struct ReplayWriter {
    exchanges: HashMap<(String, usize), Exchange>,
    occurrences: Occurrences,
    tx: mpsc::UnboundedSender<String>,
}

impl ReplayWriter {
    fn emit(&self, frame: RawFrame) -> Result<(), TransportError> {
        self.tx.send(frame.encode()).map_err(|_| TransportError::Closed {
            code: None,
            reason: "replay reader dropped".into(),
        })
    }
}

#[async_trait]
impl FrameReader for ReplayReader {
    async fn read(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl FrameWriter for ReplayWriter {
    async fn write(&mut self, frame: String) -> Result<(), TransportError> {
        let message =
            MessageOut::decode(&frame).map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let (id, body) = match message {
            MessageOut::Subscribe { id, body } => (id, body),
            MessageOut::Unsubscribe { .. } => return Ok(()),
        };

        let key = request_key(&body);
        let occurrence = self.occurrences.next(&key);
        match self.exchanges.get(&(key.clone(), occurrence)) {
            Some(frames) => {
                for (code, text) in frames {
                    self.emit(RawFrame {
                        id,
                        code: *code,
                        text: text.clone(),
                    })?;
                }
            }
            None => {
                tracing::warn!("No recorded response for {} (occurrence {})", key, occurrence);
                let error = serde_json::json!({
                    "errors": [{"errorMessage": format!("no recorded response for {}", key)}]
                });
                self.emit(RawFrame {
                    id,
                    code: FrameCode::Error,
                    text: error.to_string(),
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{BufferReader, BufferWriter};
    use crate::transport::memory;
    use serde_json::json;

    #[test]
    fn test_request_key_ignores_token_and_order() {
        let a = json!({"type": "timelineTransactions", "after": "c1", "token": "t1"});
        let b = json!({"after": "c1", "token": "t2", "type": "timelineTransactions"});
        assert_eq!(request_key(&a), request_key(&b));
        assert!(!request_key(&a).contains("t1"));
    }

    #[tokio::test]
    async fn test_recorder_captures_inbound_frames_by_request() {
        let (transport, mut peer) = memory::pair();
        let capture = BufferWriter::new();
        let (mut reader, mut writer) = Recorder::new(transport, capture.clone()).split();

        writer
            .write(r#"sub 5 {"type":"timelineDetailV2","id":"x"}"#.into())
            .await
            .unwrap();
        assert!(peer.recv().await.is_some());

        peer.send(r#"5 A {"id":"x"}"#);
        peer.send(r#"99 A {"stray":true}"#);
        assert!(reader.read().await.unwrap().is_some());
        assert!(reader.read().await.unwrap().is_some());

        let text = capture.contents_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1, "only frames of known requests are captured");
        let frame: CapturedFrame = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(frame.occurrence, 0);
        assert_eq!(frame.code, FrameCode::Answer);
        assert_eq!(frame.body, r#"{"id":"x"}"#);
    }

    #[tokio::test]
    async fn test_replay_answers_with_new_id() {
        let key = request_key(&json!({"type": "timelineTransactions"}));
        let line = serde_json::to_string(&CapturedFrame {
            key,
            occurrence: 0,
            code: FrameCode::Answer,
            body: r#"{"items":[]}"#.into(),
        })
        .unwrap();

        let replay = ReplayTransport::from_reader(&mut BufferReader::new(line)).unwrap();
        assert_eq!(replay.exchange_count(), 1);
        let (mut reader, mut writer) = replay.split();

        writer
            .write(r#"sub 42 {"type":"timelineTransactions","token":"abc"}"#.into())
            .await
            .unwrap();
        assert_eq!(
            reader.read().await.unwrap().as_deref(),
            Some(r#"42 A {"items":[]}"#)
        );

        // A second identical request has no recording → error frame.
        writer
            .write(r#"sub 43 {"type":"timelineTransactions"}"#.into())
            .await
            .unwrap();
        let frame = RawFrame::decode(&reader.read().await.unwrap().unwrap()).unwrap();
        assert_eq!(frame.id, RequestId::new(43));
        assert_eq!(frame.code, FrameCode::Error);
    }

    #[test]
    fn test_replay_rejects_malformed_capture() {
        assert!(matches!(
            ReplayTransport::parse("not json"),
            Err(TransportError::Fixture(_))
        ));
    }
}
