//! Document domain — statements and invoices attached to timeline events.

pub mod download;

pub use download::{DocumentFetcher, Downloaded, Downloader};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::detail::DocumentRef;
use crate::shared::EventId;
use crate::storage::Identifiable;

/// A document linked to the event that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Transaction or activity the document belongs to.
    pub owner_id: EventId,
    pub title: String,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
    pub postbox_type: Option<String>,
}

impl Document {
    pub fn link(owner_id: &EventId, doc: &DocumentRef) -> Self {
        Self {
            id: doc.id.clone(),
            owner_id: owner_id.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            date: doc.date,
            postbox_type: doc.postbox_type.clone(),
        }
    }
}

impl Identifiable for Document {
    fn key(&self) -> &str {
        &self.id
    }
}
