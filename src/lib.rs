//! # portfolio-downloader
//!
//! Exports a brokerage account's timeline (transactions, their details and
//! the activity log) over the broker's private WebSocket API.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Shared newtypes, domain slices, type resolution, event processing
//! 2. **Auth** — Session tokens, providers, two-step web login (`native`)
//! 3. **HTTP** — `ApiHttp` with retry policies, used by the login (`native`)
//! 4. **Transport + WebSocket** — Split transports (live / memory / replay) under a
//!    correlating `WsClient` and the cursor-following `ListGetter`
//! 5. **High-Level Client** — `PortfolioClient` with nested sub-clients
//! 6. **Handlers** — One stream end to end, into repositories and sinks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portfolio_downloader::prelude::*;
//!
//! let client = PortfolioClient::builder()
//!     .locale("de")
//!     .session_token(token)
//!     .connect()
//!     .await?;
//!
//! let outputs = TransactionOutputs::in_memory()
//!     .with_sink(CsvSink::new(FileWriter::create("transactions.csv")));
//! let mut handler = TransactionHandler::new(&client, outputs, HandlerConfig::default())?;
//! let summary = handler.run(&CancellationToken::new()).await?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, strategies.
pub mod domain;

/// Event type tag → decode strategy, per domain.
pub mod resolver;

/// Per-event state machine and stream health.
pub mod processor;

/// Error types.
pub mod error;

/// Endpoint and protocol constants.
pub mod network;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Session tokens and the web login.
pub mod auth;

// ── Layer 3: HTTP ────────────────────────────────────────────────────────────

/// HTTP client with retry policies.
pub mod http;

// ── Layer 4: Transport + WebSocket ───────────────────────────────────────────

/// Byte transports: live socket, in-memory pair, record/replay.
pub mod transport;

/// Framing, correlation and pagination.
pub mod ws;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `PortfolioClient` — the primary entry point.
pub mod client;

// ── Layer 6: Handlers and collaborators ──────────────────────────────────────

/// Stream orchestration.
pub mod handler;

/// Repositories for finished models.
pub mod storage;

/// Writers, readers and model sinks.
pub mod output;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{EventId, Isin, Money, NumberFormat};

    // Domain types
    pub use crate::domain::activity::{Activity, ActivityKind};
    pub use crate::domain::detail::{DetailKind, DetailRecord, DocumentRef};
    pub use crate::domain::document::{Document, DocumentFetcher, Downloader};
    pub use crate::domain::instrument::Instrument;
    pub use crate::domain::transaction::{Transaction, TransactionKind};

    // Resolution + processing
    pub use crate::processor::{EventReport, EventState, FailurePolicy, ProcessingStats};
    pub use crate::resolver::{Domain, Registry, Strategy, TypedEvent};

    // Auth
    pub use crate::auth::{Credentials, SessionProvider, SessionToken, StaticSession};

    // Transport + WS
    pub use crate::transport::replay::{Recorder, ReplayTransport};
    pub use crate::transport::{FrameReader, FrameWriter, Transport};
    pub use crate::ws::{CallMode, ListConfig, ListGetter, RequestId, WsClient, WsConfig};

    // Client + handlers
    pub use crate::client::{PortfolioClient, PortfolioClientBuilder};
    pub use crate::handler::{
        ActivityHandler, ActivityOutputs, HandlerConfig, StreamSummary, TransactionHandler,
        TransactionOutputs,
    };

    // Collaborators
    pub use crate::output::{
        BufferReader, BufferWriter, CsvSink, FileReader, FileWriter, JsonLinesSink, NilWriter,
        Reader, Sink, Writer,
    };
    pub use crate::storage::{Identifiable, JsonFileRepository, MemoryRepository, Repository};

    // Errors
    pub use crate::error::{PortfolioError, StreamFailure, WsError};
    pub use crate::http::RetryConfig;

    pub use tokio_util::sync::CancellationToken;
}
