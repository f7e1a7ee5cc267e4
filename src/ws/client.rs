//! Request/response correlator over a split transport.
//!
//! A background tokio task owns the transport halves and is the only reader
//! of the connection. The public API talks to it over an mpsc command channel
//! and receives frames through per-request channels held in a shared
//! registry:
//!
//! - `request()` allocates a fresh id, registers a pending call and queues a
//!   `sub` frame; it never waits on the network
//! - `await_response()` suspends only the calling task until the call's next
//!   frame, a timeout, a cancellation, or connection close
//! - frames for ids with no pending call are dropped and logged
//!
//! Ids are monotonic and never reused within a connection, so a late frame
//! for a timed out call can never reach a newer call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WsError;
use crate::transport::{FrameReader, FrameWriter, Transport};
use crate::ws::{
    apply_delta, CallMode, FrameCode, MessageOut, RawFrame, Request, RequestId, ResponseFrame,
    WsConfig,
};

type Delivery = Result<ResponseFrame, WsError>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Send(MessageOut),
    Disconnect,
}

// ─── Pending call registry ───────────────────────────────────────────────────

/// One pending call, from `request` until its last frame is consumed.
struct Pending {
    /// Dispatch side. `None` once the server side of the call is finished;
    /// frames already queued in `rx` stay deliverable.
    tx: Option<mpsc::UnboundedSender<Delivery>>,
    /// Awaiting side. Taken out while an await is in progress.
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
    mode: CallMode,
    /// Last full payload text, the base for `D` frames.
    last_text: Option<String>,
}

#[derive(Default)]
struct Registry {
    pending: HashMap<RequestId, Pending>,
    closed: bool,
}

impl Registry {
    /// Remove `id`; true when the server side was still open.
    fn forget(&mut self, id: RequestId) -> bool {
        self.pending
            .remove(&id)
            .is_some_and(|pending| pending.tx.is_some())
    }
}

struct Shared {
    registry: Mutex<Registry>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mark the connection closed and fail every open call with `Closed`.
    fn fail_all(&self) {
        let mut registry = self.registry();
        registry.closed = true;
        let mut failed = 0usize;
        for (id, pending) in registry.pending.iter_mut() {
            if let Some(tx) = pending.tx.take() {
                let _ = tx.send(Err(WsError::Closed(*id)));
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::warn!("Failing {} pending call(s): connection closed", failed);
        }
    }
}

/// Fails pending calls however the dispatch task exits.
struct DispatchExit(Arc<Shared>);

impl Drop for DispatchExit {
    fn drop(&mut self) {
        self.0.fail_all();
    }
}

/// Forgets a call whose await was dropped before it finished.
struct AwaitGuard<'a> {
    client: &'a WsClient,
    id: RequestId,
    armed: bool,
}

impl AwaitGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AwaitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Await for {} dropped", self.id);
            self.client.abandon(self.id);
        }
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// WebSocket request/response client.
///
/// Cheap to share by reference: every method takes `&self`, so sub-clients
/// and concurrent tasks can issue and await calls on the same connection.
pub struct WsClient {
    config: WsConfig,
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    task_handle: Option<JoinHandle<()>>,
}

impl WsClient {
    /// Start the dispatch task over `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: impl Transport, config: WsConfig) -> Self {
        let (reader, writer) = transport.split();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
        });

        let handle = tokio::spawn(run_dispatch(reader, writer, cmd_rx, Arc::clone(&shared)));

        Self {
            config,
            cmd_tx,
            shared,
            next_id: AtomicU64::new(1),
            task_handle: Some(handle),
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Whether the dispatch loop is still running.
    pub fn is_connected(&self) -> bool {
        !self.shared.registry().closed
    }

    /// Number of calls not yet fully consumed, answered-but-unawaited ones
    /// included.
    pub fn pending_count(&self) -> usize {
        self.shared.registry().pending.len()
    }

    /// Issue a single-response request. Returns immediately with its id.
    pub fn request(&self, request_type: &str, payload: Value) -> Result<RequestId, WsError> {
        self.request_with_mode(request_type, payload, CallMode::Once)
    }

    /// Issue a request with an explicit [`CallMode`].
    pub fn request_with_mode(
        &self,
        request_type: &str,
        payload: Value,
        mode: CallMode,
    ) -> Result<RequestId, WsError> {
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = Request {
            id,
            request_type: request_type.to_string(),
            payload,
        };
        let body = request.body(self.config.session.as_ref());

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut registry = self.shared.registry();
            if registry.closed {
                return Err(WsError::NotConnected);
            }
            registry.pending.insert(
                id,
                Pending {
                    tx: Some(tx),
                    rx: Some(rx),
                    mode,
                    last_text: None,
                },
            );
        }

        if let Err(e) = self.send(MessageOut::Subscribe { id, body }) {
            self.shared.registry().forget(id);
            return Err(e);
        }

        tracing::debug!("Request {} issued: {}", id, request_type);
        Ok(id)
    }

    /// Await the next frame of `id` with the configured request timeout.
    pub async fn await_response(&self, id: RequestId) -> Result<ResponseFrame, WsError> {
        self.await_response_with(id, self.config.request_timeout, None)
            .await
    }

    /// Await the next frame of `id`.
    ///
    /// On timeout or cancellation the pending call is removed and the server
    /// is told to stop (`unsub`); the same happens when this future is
    /// dropped before it resolves. A `Once` call is finished after its first
    /// delivery; a `Stream` call stays registered until its end frame.
    pub async fn await_response_with(
        &self,
        id: RequestId,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResponseFrame, WsError> {
        let (mut rx, mode) = {
            let mut registry = self.shared.registry();
            match registry.pending.get_mut(&id) {
                Some(pending) => (
                    pending.rx.take().ok_or(WsError::AlreadyAwaited(id))?,
                    pending.mode,
                ),
                None => return Err(WsError::UnknownRequest(id)),
            }
        };
        let guard = AwaitGuard {
            client: self,
            id,
            armed: true,
        };

        let outcome = {
            let recv = tokio::time::timeout(timeout, rx.recv());
            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(WsError::Cancelled(id)),
                    res = recv => Ok(res),
                },
                None => Ok(recv.await),
            }
        };
        guard.disarm();

        match outcome {
            Ok(Ok(Some(Ok(frame)))) => {
                if frame.is_end || mode == CallMode::Once {
                    self.abandon(id);
                } else {
                    self.restore(id, rx);
                }
                Ok(frame)
            }
            Ok(Ok(Some(Err(e)))) => {
                self.shared.registry().forget(id);
                Err(e)
            }
            Ok(Ok(None)) => {
                self.shared.registry().forget(id);
                Err(WsError::Closed(id))
            }
            Ok(Err(_elapsed)) => {
                tracing::warn!("Request {} timed out after {:?}", id, timeout);
                self.abandon(id);
                Err(WsError::Timeout {
                    id,
                    after_ms: timeout.as_millis() as u64,
                })
            }
            Err(e) => {
                tracing::debug!("Request {} cancelled", id);
                self.abandon(id);
                Err(e)
            }
        }
    }

    /// Request + await for a single-response call.
    pub async fn call(&self, request_type: &str, payload: Value) -> Result<ResponseFrame, WsError> {
        let id = self.request(request_type, payload)?;
        self.await_response(id).await
    }

    /// Request + await with cancellation.
    pub async fn call_with(
        &self,
        request_type: &str,
        payload: Value,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResponseFrame, WsError> {
        let id = self.request(request_type, payload)?;
        self.await_response_with(id, timeout, cancel).await
    }

    /// Release a call that will not be awaited, answered or not.
    pub fn discard(&self, id: RequestId) {
        self.abandon(id);
    }

    /// Stop the dispatch task. Outstanding calls fail with `Closed`.
    pub async fn close(&mut self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        self.shared.fail_all();
    }

    fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        self.cmd_tx.try_send(Command::Send(msg)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                WsError::SendFailed("Command channel full".into())
            }
            mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
        })
    }

    fn restore(&self, id: RequestId, rx: mpsc::UnboundedReceiver<Delivery>) {
        if let Some(pending) = self.shared.registry().pending.get_mut(&id) {
            pending.rx = Some(rx);
        }
    }

    /// Drop a call and, if the server side is still open, tell the server.
    fn abandon(&self, id: RequestId) {
        let still_open = self.shared.registry().forget(id);
        if still_open {
            let _ = self.send(MessageOut::Unsubscribe { id });
        }
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_dispatch(
    mut reader: Box<dyn FrameReader>,
    mut writer: Box<dyn FrameWriter>,
    mut cmd_rx: mpsc::Receiver<Command>,
    shared: Arc<Shared>,
) {
    let _exit = DispatchExit(Arc::clone(&shared));

    loop {
        tokio::select! {
            // ── a) Inbound frame ─────────────────────────────────────────
            frame = reader.read() => {
                match frame {
                    Ok(Some(text)) => {
                        if let Some(unsub) = route_frame(&shared, &text) {
                            let msg = MessageOut::Unsubscribe { id: unsub };
                            if let Err(e) = writer.write(msg.encode()).await {
                                tracing::warn!("Failed to unsubscribe {}: {}", unsub, e);
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Transport reached end of stream");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Transport error: {}", e);
                        break;
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(msg)) => {
                        let id = match &msg {
                            MessageOut::Subscribe { id, .. } | MessageOut::Unsubscribe { id } => *id,
                        };
                        if let Err(e) = writer.write(msg.encode()).await {
                            tracing::warn!("Send failed for {}: {}", id, e);
                            let tx = shared
                                .registry()
                                .pending
                                .get_mut(&id)
                                .and_then(|pending| pending.tx.take());
                            if let Some(tx) = tx {
                                let _ = tx.send(Err(WsError::Transport(e)));
                            }
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = writer.close().await;
                        break;
                    }
                }
            }
        }
    }
}

/// Deliver one inbound frame. Returns the id to unsubscribe when a
/// single-response call has just completed.
fn route_frame(shared: &Shared, text: &str) -> Option<RequestId> {
    let raw = match RawFrame::decode(text) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Dropping undecodable frame: {}; raw: {}", e, text);
            return None;
        }
    };

    let mut registry = shared.registry();
    let Some(pending) = registry
        .pending
        .get_mut(&raw.id)
        .filter(|pending| pending.tx.is_some())
    else {
        tracing::warn!(
            "Dropping {} frame for unknown or finished request {}",
            raw.code.as_str(),
            raw.id
        );
        return None;
    };

    let delivery = decode_delivery(pending, raw.id, raw.code, raw.text);
    let is_terminal = match &delivery {
        Err(_) => true,
        Ok(frame) => frame.is_end || pending.mode == CallMode::Once,
    };

    let tx = if is_terminal {
        pending.tx.take()
    } else {
        pending.tx.clone()
    };
    if let Some(tx) = tx {
        let _ = tx.send(delivery);
    }

    if is_terminal && pending.mode == CallMode::Once && raw.code != FrameCode::Complete {
        return Some(raw.id);
    }
    None
}

fn decode_delivery(pending: &mut Pending, id: RequestId, code: FrameCode, text: String) -> Delivery {
    match code {
        FrameCode::Answer => {
            let body = parse_body(id, &text)?;
            pending.last_text = Some(text);
            Ok(ResponseFrame {
                id,
                code,
                body,
                is_end: false,
            })
        }
        FrameCode::Delta => {
            let previous = pending.last_text.as_deref().ok_or_else(|| {
                WsError::ProtocolError(format!("delta for {} before any answer", id))
            })?;
            let full = apply_delta(previous, &text)?;
            let body = parse_body(id, &full)?;
            pending.last_text = Some(full);
            Ok(ResponseFrame {
                id,
                code,
                body,
                is_end: false,
            })
        }
        FrameCode::Complete => Ok(ResponseFrame {
            id,
            code,
            body: Value::Null,
            is_end: true,
        }),
        FrameCode::Error => Err(WsError::Server {
            id,
            message: server_message(&text),
        }),
    }
}

fn parse_body(id: RequestId, text: &str) -> Result<Value, WsError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| WsError::ProtocolError(format!("invalid payload for {}: {}", id, e)))
}

/// Human-readable message from an `E` frame body.
fn server_message(text: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };
    value
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("errorMessage").or_else(|| first.get("errorCode")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
