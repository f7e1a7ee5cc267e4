//! The transactions stream.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    flush_repository, keep_documents, run_stream, DetailFetcher, EntryHandler, Fetched,
    HandlerConfig, StreamSummary,
};
use crate::client::PortfolioClient;
use crate::domain::document::{Document, Downloader};
use crate::domain::instrument::Instrument;
use crate::domain::transaction::{self, Transaction, TransactionBuilder, TransactionBundle, TransactionEntry};
use crate::error::{PortfolioError, StreamFailure};
use crate::output::Sink;
use crate::processor::{EventReport, EventState};
use crate::resolver::{Registry, TypedEvent};
use crate::storage::{MemoryRepository, Repository};

const STREAM: &str = "transactions";

/// Where finished transactions go.
pub struct TransactionOutputs {
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub instruments: Arc<dyn Repository<Instrument>>,
    pub documents: Arc<dyn Repository<Document>>,
    pub sinks: Vec<Box<dyn Sink<Transaction>>>,
    /// Fetches document files; `None` keeps only the links.
    pub downloader: Option<Arc<Downloader>>,
}

impl TransactionOutputs {
    /// In-memory repositories and no sinks.
    pub fn in_memory() -> Self {
        Self {
            transactions: Arc::new(MemoryRepository::new()),
            instruments: Arc::new(MemoryRepository::new()),
            documents: Arc::new(MemoryRepository::new()),
            sinks: Vec::new(),
            downloader: None,
        }
    }

    pub fn with_sink(mut self, sink: impl Sink<Transaction> + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }
}

pub struct TransactionHandler<'a> {
    client: &'a PortfolioClient,
    registry: Registry<TransactionEntry>,
    config: HandlerConfig,
    steps: Steps<'a>,
}

impl<'a> TransactionHandler<'a> {
    pub fn new(
        client: &'a PortfolioClient,
        outputs: TransactionOutputs,
        config: HandlerConfig,
    ) -> Result<Self, PortfolioError> {
        Ok(Self {
            client,
            registry: transaction::registry()?,
            config,
            steps: Steps {
                details: DetailFetcher::new(client)?,
                builder: TransactionBuilder::new(Arc::clone(&outputs.instruments)),
                outputs,
            },
        })
    }

    pub fn outputs(&self) -> &TransactionOutputs {
        &self.steps.outputs
    }

    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<StreamSummary, StreamFailure> {
        let getter = self
            .client
            .transactions()
            .list()
            .with_config(self.config.list.clone());
        run_stream(
            STREAM,
            getter,
            &self.registry,
            self.config.failure_policy.clone(),
            &mut self.steps,
            cancel,
        )
        .await
    }
}

struct Steps<'a> {
    details: DetailFetcher<'a>,
    builder: TransactionBuilder,
    outputs: TransactionOutputs,
}

impl Steps<'_> {
    /// Every repository and sink sees the bundle; any refusal keeps it at `Built`.
    async fn deliver(&mut self, bundle: &TransactionBundle) -> bool {
        let id = &bundle.transaction.id;
        let mut ok = true;

        if let Err(e) = self.outputs.transactions.save(&bundle.transaction).await {
            tracing::warn!("Transaction {}: save failed: {}", id, e);
            ok = false;
        }
        if let (Some(instrument), true) = (&bundle.instrument, bundle.new_instrument) {
            match self.outputs.instruments.save(instrument).await {
                Ok(()) => tracing::info!("New instrument {} ({})", instrument.isin, instrument.name),
                Err(e) => {
                    tracing::warn!("Instrument {}: save failed: {}", instrument.isin, e);
                    ok = false;
                }
            }
        }
        if !keep_documents(
            self.outputs.documents.as_ref(),
            self.outputs.downloader.as_deref(),
            bundle.transaction.timestamp,
            &bundle.documents,
        )
        .await
        {
            ok = false;
        }
        for sink in &mut self.outputs.sinks {
            if let Err(e) = sink.deliver(&bundle.transaction) {
                tracing::warn!("Transaction {}: output failed: {}", id, e);
                ok = false;
            }
        }
        ok
    }
}

#[async_trait]
impl<'a> EntryHandler for Steps<'a> {
    type Entry = TransactionEntry;

    async fn complete(
        &mut self,
        event: &TypedEvent,
        entry: TransactionEntry,
        report: &mut EventReport,
        cancel: &CancellationToken,
    ) -> Result<(), PortfolioError> {
        let detail = if entry.has_detail {
            match self.details.fetch(event, &entry.id, report, cancel).await? {
                Fetched::Detail(record) => Some(record),
                Fetched::Failed => return Ok(()),
            }
        } else {
            None
        };

        let bundle = match self.builder.build(entry, detail).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!("Transaction event {} failed to build: {}", event.sequence, e);
                report.fail(e);
                return Ok(());
            }
        };
        report.advance(EventState::Built);

        if self.deliver(&bundle).await {
            report.advance(EventState::Delivered);
        }
        Ok(())
    }

    async fn flush(&mut self) {
        flush_repository("transactions", self.outputs.transactions.as_ref()).await;
        flush_repository("instruments", self.outputs.instruments.as_ref()).await;
        flush_repository("documents", self.outputs.documents.as_ref()).await;
    }
}
