//! Stream handlers — one logical timeline stream, end to end.
//!
//! A handler pulls pages through a [`ListGetter`], classifies and decodes
//! every item through a [`Processor`], fetches the item's detail record,
//! builds the finished model and hands it to the repositories and sinks in
//! the order the server sent it.
//!
//! Per-event problems (decode errors, a detail the server refuses, a sink
//! that rejects a row) are recorded in the event's [`EventReport`] and never
//! stop the stream on their own. Connection loss, exhausted retries,
//! cancellation and the [`FailurePolicy`] thresholds end it with a
//! [`StreamFailure`] that names the last fully consumed cursor.

pub mod activity;
pub mod transaction;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::client::PortfolioClient;
use crate::domain::detail::{self, DetailRecord};
use crate::domain::document::{Document, Downloader};
use crate::error::{PortfolioError, StreamFailure, WsError};
use crate::processor::{EventReport, EventState, FailurePolicy, ProcessingStats, Processor};
use crate::resolver::{Registry, TypedEvent};
use crate::shared::EventId;
use crate::storage::Repository;
use crate::ws::{ListConfig, ListGetter};

pub use activity::{ActivityHandler, ActivityOutputs};
pub use transaction::{TransactionHandler, TransactionOutputs};

/// Per-handler settings.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub list: ListConfig,
    pub failure_policy: FailurePolicy,
}

/// Result of a completed stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub stream: &'static str,
    pub stats: ProcessingStats,
    /// Page requests, retries included.
    pub requests: usize,
    pub last_cursor: Option<String>,
    pub reports: Vec<EventReport>,
}

impl StreamSummary {
    /// Reports of events that did not reach `Delivered`.
    pub fn problems(&self) -> impl Iterator<Item = &EventReport> {
        self.reports
            .iter()
            .filter(|r| r.state != EventState::Delivered)
    }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// The stream-specific part of a handler: Decoded → Built → Delivered.
#[async_trait]
pub(crate) trait EntryHandler: Send {
    type Entry: Send + 'static;

    /// Finish one decoded entry. Per-event failures go into `report`;
    /// `Err` ends the stream.
    async fn complete(
        &mut self,
        event: &TypedEvent,
        entry: Self::Entry,
        report: &mut EventReport,
        cancel: &CancellationToken,
    ) -> Result<(), PortfolioError>;

    /// Write out buffered repositories. Runs however the stream ended.
    async fn flush(&mut self) {}
}

pub(crate) async fn run_stream<H: EntryHandler>(
    stream: &'static str,
    getter: ListGetter<'_>,
    registry: &Registry<H::Entry>,
    policy: FailurePolicy,
    handler: &mut H,
    cancel: &CancellationToken,
) -> Result<StreamSummary, StreamFailure> {
    let getter = getter.with_cancellation(cancel.clone());
    let mut processor = Processor::new(registry, policy);
    let mut sequence = 0usize;

    tracing::info!("{}: starting", stream);
    let result: Result<(), PortfolioError> = async {
        let pages = getter.pages(json!({}));
        futures_util::pin_mut!(pages);

        while let Some(page) = pages.next().await {
            for item in page?.items {
                if cancel.is_cancelled() {
                    return Err(PortfolioError::Cancelled);
                }
                let event = TypedEvent::new(sequence, registry.domain(), item);
                sequence += 1;

                let (mut report, entry) = processor.decode(&event);
                if let Some(entry) = entry {
                    handler.complete(&event, entry, &mut report, cancel).await?;
                }
                processor.record(report)?;
            }
        }
        Ok(())
    }
    .await;

    handler.flush().await;

    if let Err(cause) = result {
        let failure = StreamFailure::new(stream, getter.last_cursor(), cause);
        tracing::error!("{}", failure);
        return Err(failure);
    }

    let stats = processor.stats();
    tracing::info!(
        "{}: {} received, {} delivered, {} failed, {} unclassified, {} delivery error(s)",
        stream,
        stats.received,
        stats.delivered,
        stats.failed,
        stats.unclassified,
        stats.delivery_errors
    );
    Ok(StreamSummary {
        stream,
        stats,
        requests: getter.requests_issued(),
        last_cursor: getter.last_cursor(),
        reports: processor.into_reports(),
    })
}

// ─── Delivery helpers ────────────────────────────────────────────────────────

/// Saves an event's documents, and fetches their files when a downloader is
/// set. Returns `false` if any save or download failed.
pub(crate) async fn keep_documents(
    repository: &dyn Repository<Document>,
    downloader: Option<&Downloader>,
    owner_time: DateTime<Utc>,
    documents: &[Document],
) -> bool {
    let mut ok = true;
    for doc in documents {
        if let Err(e) = repository.save(doc).await {
            tracing::warn!("Document {} of {}: save failed: {}", doc.id, doc.owner_id, e);
            ok = false;
        }
        if let Some(downloader) = downloader {
            if let Err(e) = downloader.download(doc, owner_time).await {
                tracing::warn!("Document {} of {}: download failed: {}", doc.id, doc.owner_id, e);
                ok = false;
            }
        }
    }
    ok
}

pub(crate) async fn flush_repository<T: Send + Sync>(name: &str, repository: &dyn Repository<T>) {
    if let Err(e) = repository.flush().await {
        tracing::warn!("{}: flush failed: {}", name, e);
    }
}

// ─── Details ─────────────────────────────────────────────────────────────────

pub(crate) enum Fetched {
    Detail(DetailRecord),
    /// The event failed; the reason is already in its report.
    Failed,
}

/// Fetches and decodes detail records for a handler.
pub(crate) struct DetailFetcher<'a> {
    client: &'a PortfolioClient,
    registry: Registry<DetailRecord>,
}

impl<'a> DetailFetcher<'a> {
    pub(crate) fn new(client: &'a PortfolioClient) -> Result<Self, PortfolioError> {
        Ok(Self {
            client,
            registry: detail::registry(client.number_format())?,
        })
    }

    /// Server-side refusals and undecodable details fail the event;
    /// transport problems, exhausted retries and cancellation are returned.
    pub(crate) async fn fetch(
        &self,
        parent: &TypedEvent,
        id: &EventId,
        report: &mut EventReport,
        cancel: &CancellationToken,
    ) -> Result<Fetched, PortfolioError> {
        let event = match self.client.details().get_for(parent, id, Some(cancel)).await {
            Ok(event) => event,
            Err(e @ (WsError::Server { .. } | WsError::ProtocolError(_))) => {
                tracing::warn!("Detail for {} unavailable: {}", id, e);
                report.fail(format!("detail: {}", e));
                return Ok(Fetched::Failed);
            }
            Err(e) => return Err(e.into()),
        };

        let resolved = self.registry.resolve(event.type_tag.as_deref());
        match resolved.strategy.decode(&event) {
            Ok(record) => {
                tracing::debug!("Detail for {} decoded by {}", id, resolved.strategy.name());
                Ok(Fetched::Detail(record))
            }
            Err(e) => {
                tracing::warn!("Detail for {} failed to decode: {}", id, e);
                report.fail(format!("detail: {}", e));
                Ok(Fetched::Failed)
            }
        }
    }
}
