//! The activity-log stream.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    flush_repository, keep_documents, run_stream, DetailFetcher, EntryHandler, Fetched,
    HandlerConfig, StreamSummary,
};
use crate::client::PortfolioClient;
use crate::domain::activity::{self, Activity, ActivityBundle, ActivityEntry};
use crate::domain::document::{Document, Downloader};
use crate::error::{PortfolioError, StreamFailure};
use crate::output::Sink;
use crate::processor::{EventReport, EventState};
use crate::resolver::{Registry, TypedEvent};
use crate::storage::{MemoryRepository, Repository};

const STREAM: &str = "activity_log";

pub struct ActivityOutputs {
    pub activities: Arc<dyn Repository<Activity>>,
    pub documents: Arc<dyn Repository<Document>>,
    pub sinks: Vec<Box<dyn Sink<Activity>>>,
    pub downloader: Option<Arc<Downloader>>,
}

impl ActivityOutputs {
    pub fn in_memory() -> Self {
        Self {
            activities: Arc::new(MemoryRepository::new()),
            documents: Arc::new(MemoryRepository::new()),
            sinks: Vec::new(),
            downloader: None,
        }
    }

    pub fn with_sink(mut self, sink: impl Sink<Activity> + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }
}

pub struct ActivityHandler<'a> {
    client: &'a PortfolioClient,
    registry: Registry<ActivityEntry>,
    config: HandlerConfig,
    steps: Steps<'a>,
}

impl<'a> ActivityHandler<'a> {
    pub fn new(
        client: &'a PortfolioClient,
        outputs: ActivityOutputs,
        config: HandlerConfig,
    ) -> Result<Self, PortfolioError> {
        Ok(Self {
            client,
            registry: activity::registry()?,
            config,
            steps: Steps {
                details: DetailFetcher::new(client)?,
                outputs,
            },
        })
    }

    pub fn outputs(&self) -> &ActivityOutputs {
        &self.steps.outputs
    }

    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<StreamSummary, StreamFailure> {
        let getter = self
            .client
            .activity_log()
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
    outputs: ActivityOutputs,
}

impl Steps<'_> {
    async fn deliver(&mut self, bundle: &ActivityBundle) -> bool {
        let id = &bundle.activity.id;
        let mut ok = true;

        if let Err(e) = self.outputs.activities.save(&bundle.activity).await {
            tracing::warn!("Activity {}: save failed: {}", id, e);
            ok = false;
        }
        if !keep_documents(
            self.outputs.documents.as_ref(),
            self.outputs.downloader.as_deref(),
            bundle.activity.timestamp,
            &bundle.documents,
        )
        .await
        {
            ok = false;
        }
        for sink in &mut self.outputs.sinks {
            if let Err(e) = sink.deliver(&bundle.activity) {
                tracing::warn!("Activity {}: output failed: {}", id, e);
                ok = false;
            }
        }
        ok
    }
}

#[async_trait]
impl<'a> EntryHandler for Steps<'a> {
    type Entry = ActivityEntry;

    async fn complete(
        &mut self,
        event: &TypedEvent,
        entry: ActivityEntry,
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

        let bundle = match ActivityBundle::build(entry, detail) {
            Ok(bundle) => bundle,
            Err(e) => {
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
        flush_repository("activities", self.outputs.activities.as_ref()).await;
        flush_repository("documents", self.outputs.documents.as_ref()).await;
    }
}
