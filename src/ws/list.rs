//! Cursor pagination on top of [`WsClient`].
//!
//! A list endpoint answers each request with one page:
//!
//! ```text
//! {"items": [...], "cursors": {"before": "...", "after": "..."}}
//! ```
//!
//! A present `after` cursor is echoed verbatim in the next request, merged
//! into the original parameters; an absent one ends the list. Each page
//! request is only issued once the previous page's cursor is known, so item
//! order is exactly the server's order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::WsError;
use crate::http::RetryConfig;
use crate::resolver::{Domain, TypedEvent};
use crate::ws::retry::with_retry;
use crate::ws::{RequestId, WsClient};

/// Pagination settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ListConfig {
    /// Upper bound on pages per list; guards against an endless cursor chain.
    pub max_pages: usize,
    /// Per-page retry on retryable errors (timeouts, dropped sends).
    pub retry: RetryConfig,
    /// Per-page deadline. `None` uses the client's request timeout.
    pub page_timeout: Option<Duration>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            max_pages: 500,
            retry: RetryConfig::page_fetch(),
            page_timeout: None,
        }
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Continuation cursor; `None` on the last page.
    pub cursor: Option<String>,
}

impl Page {
    /// Parse a page body.
    pub fn from_body(id: RequestId, body: &Value) -> Result<Self, WsError> {
        let items = match body.get("items") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => {
                return Err(WsError::ProtocolError(format!(
                    "page for {} has no items array",
                    id
                )))
            }
            Some(other) => {
                return Err(WsError::ProtocolError(format!(
                    "page for {} has non-array items: {}",
                    id, other
                )))
            }
        };

        let cursor = body
            .get("cursors")
            .and_then(|c| c.get("after"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Self { items, cursor })
    }
}

/// Drives one paginated list endpoint.
pub struct ListGetter<'a> {
    ws: &'a WsClient,
    request_type: String,
    domain: Domain,
    config: ListConfig,
    cancel: Option<CancellationToken>,
    last_cursor: Mutex<Option<String>>,
    requests: AtomicUsize,
}

impl<'a> ListGetter<'a> {
    pub fn new(ws: &'a WsClient, request_type: impl Into<String>, domain: Domain) -> Self {
        Self {
            ws,
            request_type: request_type.into(),
            domain,
            config: ListConfig::default(),
            cancel: None,
            last_cursor: Mutex::new(None),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_config(mut self, config: ListConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop issuing page requests and fail pending ones once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Cursor after the last page handed to the consumer, for resumption.
    pub fn last_cursor(&self) -> Option<String> {
        match self.last_cursor.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Page requests issued so far, retries included.
    pub fn requests_issued(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Lazy sequence of pages, starting from `initial` parameters.
    pub fn pages(&self, initial: Value) -> impl Stream<Item = Result<Page, WsError>> + Send + '_ {
        async_stream::try_stream! {
            let mut cursor: Option<String> = None;
            let mut fetched = 0usize;

            loop {
                if self.is_cancelled() {
                    tracing::debug!("{}: cancelled before page {}", self.request_type, fetched + 1);
                    Err(WsError::Interrupted)?;
                }
                if fetched >= self.config.max_pages {
                    tracing::warn!(
                        "{}: stopping at max_pages={} with cursor {:?} still pending",
                        self.request_type,
                        self.config.max_pages,
                        cursor
                    );
                    break;
                }

                let page = self.fetch_page(&initial, cursor.as_deref()).await?;
                fetched += 1;
                tracing::debug!(
                    "{}: page {} with {} item(s), next cursor {:?}",
                    self.request_type,
                    fetched,
                    page.items.len(),
                    page.cursor
                );

                let next = page.cursor.clone();
                yield page;

                match next {
                    Some(c) => {
                        self.set_last_cursor(c.clone());
                        cursor = Some(c);
                    }
                    None => break,
                }
            }
        }
    }

    /// Fetch every page and return the items as typed events, in order.
    pub async fn get_list(&self, initial: Value) -> Result<Vec<TypedEvent>, WsError> {
        let mut events = Vec::new();
        let pages = self.pages(initial);
        futures_util::pin_mut!(pages);

        while let Some(page) = pages.next().await {
            for item in page?.items {
                events.push(TypedEvent::new(events.len(), self.domain, item));
            }
        }

        tracing::info!("{}: {} event(s) received", self.request_type, events.len());
        Ok(events)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn set_last_cursor(&self, cursor: String) {
        match self.last_cursor.lock() {
            Ok(mut guard) => *guard = Some(cursor),
            Err(poisoned) => *poisoned.into_inner() = Some(cursor),
        }
    }

    fn payload_for(initial: &Value, cursor: Option<&str>) -> Value {
        let mut payload = match initial {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        if let Some(c) = cursor {
            payload.insert("after".into(), Value::String(c.to_string()));
        }
        Value::Object(payload)
    }

    /// One page, retried on retryable errors with the same cursor.
    async fn fetch_page(&self, initial: &Value, cursor: Option<&str>) -> Result<Page, WsError> {
        let timeout = self
            .config
            .page_timeout
            .unwrap_or(self.ws.config().request_timeout);
        let payload = Self::payload_for(initial, cursor);

        with_retry(
            &self.config.retry,
            self.cancel.as_ref(),
            &self.request_type,
            || async {
                if self.is_cancelled() {
                    return Err(WsError::Interrupted);
                }
                self.requests.fetch_add(1, Ordering::SeqCst);
                let id = self.ws.request(&self.request_type, payload.clone())?;
                let frame = self
                    .ws
                    .await_response_with(id, timeout, self.cancel.as_ref())
                    .await?;
                Page::from_body(id, &frame.body)
            },
        )
        .await
    }
}
