//! Unified error types.

use std::fmt;

use thiserror::Error;

use crate::ws::RequestId;

/// Top-level error.
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("{0}")]
    Stream(#[from] StreamFailure),

    #[error("Systemic failure: {0}")]
    Systemic(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Byte-level transport errors (live socket or replay source).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Fixture error: {0}")]
    Fixture(String),
}

/// Request/response correlation errors.
#[derive(Error, Debug, Clone)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed while request {0} was pending")]
    Closed(RequestId),

    #[error("Request {id} timed out after {after_ms}ms")]
    Timeout { id: RequestId, after_ms: u64 },

    #[error("Request {0} cancelled")]
    Cancelled(RequestId),

    #[error("Cancelled before the next request was issued")]
    Interrupted,

    #[error("No pending request with id {0}")]
    UnknownRequest(RequestId),

    #[error("Request {0} is already being awaited")]
    AlreadyAwaited(RequestId),

    #[error("Server error for request {id}: {message}")]
    Server { id: RequestId, message: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WsError {
    /// Whether a page fetch failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            WsError::Timeout { .. } | WsError::SendFailed(_) => true,
            WsError::Transport(e) => matches!(
                e,
                TransportError::SendFailed(_) | TransportError::ReceiveFailed(_)
            ),
            _ => false,
        }
    }
}

/// Structural decode failures for a single event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

impl DecodeError {
    pub fn missing(field: impl Into<String>) -> Self {
        DecodeError::MissingField(field.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        DecodeError::InvalidField {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// Type registry configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    #[error("type tag `{tag}` already registered in the {domain} registry")]
    DuplicateTag { domain: String, tag: String },
}

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Verification code rejected: {0}")]
    VerificationFailed(String),

    #[error("No session cookie in response")]
    MissingSession,

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "native")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Repository failures. Non-fatal per record.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Document download failures. Non-fatal per document.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writer/reader and sink failures.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A logical stream that could not be completed.
///
/// Carries enough context to resume: the stream name and the last cursor
/// whose page was fully consumed.
#[derive(Debug)]
pub struct StreamFailure {
    pub stream: String,
    pub last_cursor: Option<String>,
    pub cause: Box<PortfolioError>,
}

impl StreamFailure {
    pub fn new(
        stream: impl Into<String>,
        last_cursor: Option<String>,
        cause: impl Into<PortfolioError>,
    ) -> Self {
        Self {
            stream: stream.into(),
            last_cursor,
            cause: Box::new(cause.into()),
        }
    }
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream `{}` failed", self.stream)?;
        if let Some(cursor) = &self.last_cursor {
            write!(f, " after cursor `{}`", cursor)?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl std::error::Error for StreamFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let e = WsError::Timeout {
            id: RequestId::new(3),
            after_ms: 100,
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_closed_and_cancelled_are_not_retryable() {
        assert!(!WsError::Closed(RequestId::new(1)).is_retryable());
        assert!(!WsError::Cancelled(RequestId::new(1)).is_retryable());
        assert!(!WsError::Transport(TransportError::Closed {
            code: Some(1000),
            reason: "bye".into()
        })
        .is_retryable());
    }

    #[test]
    fn test_stream_failure_display_includes_cursor() {
        let failure = StreamFailure::new(
            "timelineTransactions",
            Some("c2".into()),
            WsError::NotConnected,
        );
        let text = failure.to_string();
        assert!(text.contains("timelineTransactions"));
        assert!(text.contains("c2"));
        assert!(text.contains("Not connected"));
    }
}
