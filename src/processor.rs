//! Per-event state machine and stream health tracking.
//!
//! ```text
//! Received → Resolved → Decoded → Built → Delivered
//!               │          │
//!               └──────────┴──→ Failed
//! ```
//!
//! Every event yields an [`EventReport`]. A failed event is recorded and
//! skipped; the stream only fails when the [`FailurePolicy`] sees a
//! systemic pattern (the same tag failing over and over, or too large a
//! share of all events failing).

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::PortfolioError;
use crate::resolver::{Registry, TypedEvent};

// ─── Event state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Received,
    Resolved,
    Decoded,
    Built,
    Delivered,
    Failed,
}

impl EventState {
    pub fn can_transition_to(self, next: EventState) -> bool {
        use EventState::*;
        matches!(
            (self, next),
            (Received, Resolved)
                | (Resolved, Decoded)
                | (Decoded, Built)
                | (Built, Delivered)
                | (Resolved, Failed)
                | (Decoded, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EventState::Delivered | EventState::Failed)
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventState::Received => "received",
            EventState::Resolved => "resolved",
            EventState::Decoded => "decoded",
            EventState::Built => "built",
            EventState::Delivered => "delivered",
            EventState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventReport {
    pub sequence: usize,
    pub event_id: Option<String>,
    pub type_tag: Option<String>,
    pub strategy: &'static str,
    pub classified: bool,
    pub state: EventState,
    pub failure: Option<String>,
}

impl EventReport {
    fn received(event: &TypedEvent) -> Self {
        Self {
            sequence: event.sequence,
            event_id: event.id().map(str::to_string),
            type_tag: event.type_tag.clone(),
            strategy: "",
            classified: false,
            state: EventState::Received,
            failure: None,
        }
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    pub fn advance(&mut self, next: EventState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                "Event {}: illegal transition {} → {}",
                self.sequence,
                self.state,
                next
            );
            return false;
        }
        self.state = next;
        true
    }

    /// Move to `Failed` with a reason.
    pub fn fail(&mut self, reason: impl fmt::Display) {
        if self.advance(EventState::Failed) {
            self.failure = Some(reason.to_string());
        }
    }
}

// ─── Policy + stats ──────────────────────────────────────────────────────────

/// Thresholds at which per-event failures become a stream failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailurePolicy {
    /// Consecutive failures of one type tag treated as a schema change.
    pub max_consecutive_per_tag: usize,
    /// Failed / received ratio above which the stream fails.
    pub max_failure_ratio: f64,
    /// Events seen before the ratio is enforced.
    pub min_events_for_ratio: usize,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_per_tag: 10,
            max_failure_ratio: 0.5,
            min_events_for_ratio: 20,
        }
    }
}

impl FailurePolicy {
    /// Never fail the stream, whatever the error rate.
    pub fn lenient() -> Self {
        Self {
            max_consecutive_per_tag: usize::MAX,
            max_failure_ratio: 1.0,
            min_events_for_ratio: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub received: usize,
    pub built: usize,
    pub delivered: usize,
    pub failed: usize,
    pub unclassified: usize,
    /// Built models a sink or repository rejected.
    pub delivery_errors: usize,
}

// ─── Processor ───────────────────────────────────────────────────────────────

/// Resolves and decodes events of one stream and keeps its health.
pub struct Processor<'r, D> {
    registry: &'r Registry<D>,
    policy: FailurePolicy,
    stats: ProcessingStats,
    consecutive: HashMap<String, usize>,
    reports: Vec<EventReport>,
}

impl<'r, D> Processor<'r, D> {
    pub fn new(registry: &'r Registry<D>, policy: FailurePolicy) -> Self {
        Self {
            registry,
            policy,
            stats: ProcessingStats::default(),
            consecutive: HashMap::new(),
            reports: Vec::new(),
        }
    }

    /// Received → Resolved → Decoded, or Failed.
    pub fn decode(&mut self, event: &TypedEvent) -> (EventReport, Option<D>) {
        let mut report = EventReport::received(event);
        self.stats.received += 1;

        let resolved = self.registry.resolve(event.type_tag.as_deref());
        report.strategy = resolved.strategy.name();
        report.classified = resolved.classified;
        report.advance(EventState::Resolved);

        if !resolved.classified {
            self.stats.unclassified += 1;
            tracing::warn!(
                "{} event {} has unclassified type `{}`",
                self.registry.domain(),
                event.sequence,
                event.tag_or_unknown()
            );
        }

        match resolved.strategy.decode(event) {
            Ok(decoded) => {
                report.advance(EventState::Decoded);
                (report, Some(decoded))
            }
            Err(e) => {
                tracing::warn!(
                    "{} event {} (`{}`) failed to decode: {}",
                    self.registry.domain(),
                    event.sequence,
                    event.tag_or_unknown(),
                    e
                );
                report.fail(e);
                (report, None)
            }
        }
    }

    /// Record a finished event and check the failure policy.
    pub fn record(&mut self, report: EventReport) -> Result<(), PortfolioError> {
        let tag = report.type_tag.clone().unwrap_or_default();
        match report.state {
            EventState::Failed => {
                self.stats.failed += 1;
                *self.consecutive.entry(tag.clone()).or_insert(0) += 1;
            }
            EventState::Built => {
                self.stats.built += 1;
                self.stats.delivery_errors += 1;
                self.consecutive.insert(tag.clone(), 0);
            }
            EventState::Delivered => {
                self.stats.built += 1;
                self.stats.delivered += 1;
                self.consecutive.insert(tag.clone(), 0);
            }
            other => {
                tracing::error!(
                    "Event {} recorded in non-final state {}",
                    report.sequence,
                    other
                );
            }
        }
        self.reports.push(report);
        self.check(&tag)
    }

    fn check(&self, tag: &str) -> Result<(), PortfolioError> {
        let streak = self.consecutive.get(tag).copied().unwrap_or(0);
        if streak >= self.policy.max_consecutive_per_tag {
            return Err(PortfolioError::Systemic(format!(
                "{} consecutive failures for type `{}` in {}",
                streak,
                if tag.is_empty() { "<none>" } else { tag },
                self.registry.domain()
            )));
        }

        if self.stats.received >= self.policy.min_events_for_ratio && self.stats.received > 0 {
            let ratio = self.stats.failed as f64 / self.stats.received as f64;
            if ratio > self.policy.max_failure_ratio {
                return Err(PortfolioError::Systemic(format!(
                    "{} of {} events failed in {} ({:.0}%)",
                    self.stats.failed,
                    self.stats.received,
                    self.registry.domain(),
                    ratio * 100.0
                )));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }

    pub fn reports(&self) -> &[EventReport] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<EventReport> {
        self.reports
    }
}
