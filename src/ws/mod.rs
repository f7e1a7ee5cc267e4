//! WebSocket layer — framing, correlation, pagination.
//!
//! The transport underneath is pluggable (`crate::transport`): a live
//! `tokio-tungstenite` socket or a replay of captured frames. This module
//! defines the message shapes shared by both and the text codec:
//!
//! - outbound `sub <id> <json>` / `unsub <id>`
//! - inbound `<id> <code> <json?>` where code is `A`, `D`, `C` or `E`

pub mod client;
pub mod list;
pub mod retry;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::SessionToken;
use crate::error::WsError;

pub use client::WsClient;
pub use list::{ListConfig, ListGetter, Page};

// ─── RequestId ───────────────────────────────────────────────────────────────

/// Correlation id linking a subscribe request to its response frames.
///
/// Allocated monotonically per connection and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Outbound messages ───────────────────────────────────────────────────────

/// A tagged request issued by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub request_type: String,
    pub payload: Value,
}

impl Request {
    /// Request body as sent on the wire: parameters plus `"type"`, plus the
    /// session token when one is configured.
    pub fn body(&self, session: Option<&SessionToken>) -> Value {
        let mut body = match &self.payload {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".into(), other.clone());
                map
            }
        };
        body.insert("type".into(), Value::String(self.request_type.clone()));
        if let Some(token) = session {
            body.insert("token".into(), Value::String(token.expose().to_string()));
        }
        Value::Object(body)
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOut {
    Subscribe { id: RequestId, body: Value },
    Unsubscribe { id: RequestId },
}

impl MessageOut {
    pub fn encode(&self) -> String {
        match self {
            MessageOut::Subscribe { id, body } => format!("sub {} {}", id, body),
            MessageOut::Unsubscribe { id } => format!("unsub {}", id),
        }
    }

    /// Parse an outbound frame. Used by transports that answer requests
    /// themselves (replay, tests).
    pub fn decode(text: &str) -> Result<Self, WsError> {
        let mut parts = text.splitn(3, ' ');
        let verb = parts.next().unwrap_or_default();
        let id = parts
            .next()
            .ok_or_else(|| WsError::ProtocolError(format!("missing id in `{}`", text)))
            .and_then(parse_id)?;

        match verb {
            "sub" => {
                let raw = parts.next().unwrap_or("{}");
                let body = serde_json::from_str(raw)
                    .map_err(|e| WsError::ProtocolError(format!("bad sub body: {}", e)))?;
                Ok(MessageOut::Subscribe { id, body })
            }
            "unsub" => Ok(MessageOut::Unsubscribe { id }),
            other => Err(WsError::ProtocolError(format!("unknown verb `{}`", other))),
        }
    }
}

// ─── Inbound frames ──────────────────────────────────────────────────────────

/// Inbound frame status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameCode {
    /// Full answer payload.
    #[serde(rename = "A")]
    Answer,
    /// Delta against the previous payload of the same id.
    #[serde(rename = "D")]
    Delta,
    /// Subscription complete; no further frames.
    #[serde(rename = "C")]
    Complete,
    /// Server-side error.
    #[serde(rename = "E")]
    Error,
}

impl FrameCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameCode::Answer => "A",
            FrameCode::Delta => "D",
            FrameCode::Complete => "C",
            FrameCode::Error => "E",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(FrameCode::Answer),
            "D" => Some(FrameCode::Delta),
            "C" => Some(FrameCode::Complete),
            "E" => Some(FrameCode::Error),
            _ => None,
        }
    }
}

/// A raw inbound frame before delta application.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub id: RequestId,
    pub code: FrameCode,
    pub text: String,
}

impl RawFrame {
    pub fn decode(text: &str) -> Result<Self, WsError> {
        let mut parts = text.splitn(3, ' ');
        let id = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WsError::ProtocolError("empty frame".into()))
            .and_then(parse_id)?;
        let code = parts
            .next()
            .and_then(FrameCode::parse)
            .ok_or_else(|| WsError::ProtocolError(format!("bad frame code in `{}`", text)))?;
        let text = parts.next().unwrap_or_default().to_string();
        Ok(RawFrame { id, code, text })
    }

    pub fn encode(&self) -> String {
        if self.text.is_empty() {
            format!("{} {}", self.id, self.code.as_str())
        } else {
            format!("{} {} {}", self.id, self.code.as_str(), self.text)
        }
    }
}

/// A decoded response delivered to the waiter that owns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: RequestId,
    pub code: FrameCode,
    pub body: Value,
    pub is_end: bool,
}

fn parse_id(s: &str) -> Result<RequestId, WsError> {
    s.parse::<u64>()
        .map(RequestId)
        .map_err(|_| WsError::ProtocolError(format!("invalid correlation id `{}`", s)))
}

/// Apply a delta instruction list to the previous payload text.
///
/// Instructions are tab-separated: `+text` inserts text, `=n` copies the next
/// `n` characters of the previous payload, `-n` skips them.
pub fn apply_delta(previous: &str, delta: &str) -> Result<String, WsError> {
    let prev: Vec<char> = previous.chars().collect();
    let mut out = String::with_capacity(previous.len());
    let mut pos = 0usize;

    for instruction in delta.split('\t').filter(|s| !s.is_empty()) {
        let mut chars = instruction.chars();
        let op = chars.next();
        let arg = chars.as_str();
        match op {
            Some('+') => out.push_str(arg),
            Some(op @ ('=' | '-')) => {
                let n: usize = arg.parse().map_err(|_| {
                    WsError::ProtocolError(format!("bad delta instruction `{}`", instruction))
                })?;
                let end = pos.checked_add(n).filter(|end| *end <= prev.len()).ok_or_else(|| {
                    WsError::ProtocolError(format!(
                        "delta overruns previous payload ({} + {} > {})",
                        pos,
                        n,
                        prev.len()
                    ))
                })?;
                if op == '=' {
                    out.extend(&prev[pos..end]);
                }
                pos = end;
            }
            _ => {
                return Err(WsError::ProtocolError(format!(
                    "bad delta instruction `{}`",
                    instruction
                )))
            }
        }
    }

    Ok(out)
}

// ─── Call mode ───────────────────────────────────────────────────────────────

/// How many frames a pending call expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Completes on the first answer or error frame.
    #[default]
    Once,
    /// Ordered queue of frames until a complete or error frame.
    Stream,
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the WS client.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub locale: String,
    /// Deadline applied by `await_response`.
    pub request_timeout: Duration,
    /// Capacity of the command channel into the dispatch task.
    pub command_capacity: usize,
    /// Session token injected into every subscribe body.
    pub session: Option<SessionToken>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            locale: "en".to_string(),
            request_timeout: Duration::from_secs(30),
            command_capacity: 256,
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_encoding() {
        let msg = MessageOut::Subscribe {
            id: RequestId::new(7),
            body: json!({"type": "timelineTransactions"}),
        };
        assert_eq!(msg.encode(), r#"sub 7 {"type":"timelineTransactions"}"#);
        assert_eq!(
            MessageOut::Unsubscribe {
                id: RequestId::new(7)
            }
            .encode(),
            "unsub 7"
        );
    }

    #[test]
    fn test_outbound_decode() {
        let msg = MessageOut::decode(r#"sub 12 {"type":"timelineDetailV2","id":"abc"}"#).unwrap();
        match msg {
            MessageOut::Subscribe { id, body } => {
                assert_eq!(id, RequestId::new(12));
                assert_eq!(body["id"], "abc");
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
        assert!(MessageOut::decode("pub 1 {}").is_err());
    }

    #[test]
    fn test_request_body_injects_type_and_token() {
        let req = Request {
            id: RequestId::new(1),
            request_type: "timelineTransactions".into(),
            payload: json!({"after": "c1"}),
        };
        let token = SessionToken::new("secret");
        let body = req.body(Some(&token));
        assert_eq!(body["type"], "timelineTransactions");
        assert_eq!(body["after"], "c1");
        assert_eq!(body["token"], "secret");

        let anonymous = req.body(None);
        assert!(anonymous.get("token").is_none());
    }

    #[test]
    fn test_raw_frame_decode() {
        let frame = RawFrame::decode(r#"4 A {"items":[]}"#).unwrap();
        assert_eq!(frame.id, RequestId::new(4));
        assert_eq!(frame.code, FrameCode::Answer);
        assert_eq!(frame.text, r#"{"items":[]}"#);

        let complete = RawFrame::decode("4 C").unwrap();
        assert_eq!(complete.code, FrameCode::Complete);
        assert!(complete.text.is_empty());

        assert!(RawFrame::decode("x A {}").is_err());
        assert!(RawFrame::decode("4 Z {}").is_err());
        assert!(RawFrame::decode("").is_err());
    }

    #[test]
    fn test_apply_delta() {
        let prev = r#"{"a":1,"b":2}"#;
        // keep `{"a":`, replace `1` with `5`, keep the rest
        let next = apply_delta(prev, "=5\t-1\t+5\t=7").unwrap();
        assert_eq!(next, r#"{"a":5,"b":2}"#);
    }

    #[test]
    fn test_apply_delta_rejects_overrun() {
        assert!(apply_delta("abc", "=10").is_err());
        assert!(apply_delta("abc", "?1").is_err());
        let huge = format!("=1\t={}", usize::MAX);
        assert!(matches!(
            apply_delta("abc", &huge),
            Err(WsError::ProtocolError(_))
        ));
    }
}
