//! Activity domain — account events without a cash movement.

pub mod client;
mod convert;
pub mod strategy;
pub mod wire;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::detail::DetailRecord;
use crate::domain::document::Document;
use crate::error::DecodeError;
use crate::shared::EventId;
use crate::storage::Identifiable;

pub use strategy::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Reports, confirmations and notices posted to the mailbox.
    Document,
    /// Profile and account settings.
    Account,
    Card,
    Security,
    Unclassified,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Document => "document",
            ActivityKind::Account => "account",
            ActivityKind::Card => "card",
            ActivityKind::Security => "security",
            ActivityKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded activity item.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: EventId,
    pub kind: ActivityKind,
    pub event_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub subtitle: Option<String>,
    pub has_detail: bool,
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: EventId,
    pub kind: ActivityKind,
    pub event_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub subtitle: Option<String>,
    pub document_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Identifiable for Activity {
    fn key(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBundle {
    pub activity: Activity,
    pub documents: Vec<Document>,
}

impl ActivityBundle {
    pub fn build(entry: ActivityEntry, detail: Option<DetailRecord>) -> Result<Self, DecodeError> {
        let documents: Vec<Document> = match &detail {
            Some(d) if d.id != entry.id => {
                return Err(DecodeError::Shape(format!(
                    "detail {} does not belong to activity {}",
                    d.id, entry.id
                )))
            }
            Some(d) => d.documents.iter().map(|r| Document::link(&entry.id, r)).collect(),
            None => Vec::new(),
        };

        let activity = Activity {
            document_ids: documents.iter().map(|d| d.id.clone()).collect(),
            id: entry.id,
            kind: entry.kind,
            event_type: entry.event_type,
            timestamp: entry.timestamp,
            title: entry.title,
            subtitle: entry.subtitle,
            raw: entry.raw,
        };
        Ok(Self { activity, documents })
    }
}
