//! Decode strategies for activity-log events.

use super::wire::ActivityItem;
use super::{ActivityEntry, ActivityKind};
use crate::error::{DecodeError, ResolverError};
use crate::resolver::{Domain, Registry, Strategy, TypedEvent};

pub mod tags {
    pub const DOCUMENT: &[&str] = &[
        "DOCUMENTS_ACCEPTED",
        "DOCUMENTS_CREATED",
        "DOCUMENTS_CHANGED",
        "EX_POST_COST_REPORT",
        "QUARTERLY_REPORT",
        "YEAR_END_TAX_REPORT",
        "GENERAL_MEETING",
        "SHAREBOOKING",
    ];
    pub const ACCOUNT: &[&str] = &[
        "CUSTOMER_CREATED",
        "SECURITIES_ACCOUNT_CREATED",
        "EXEMPTION_ORDER_CHANGED",
        "EXEMPTION_ORDER_CHANGE_REQUESTED",
        "VERIFICATION_TRANSFER_ACCEPTED",
        "REFERENCE_ACCOUNT_CHANGED",
        "ADDRESS_CHANGED",
        "MOBILE_CHANGED",
        "EMAIL_VALIDATED",
    ];
    pub const CARD: &[&str] = &[
        "card_created",
        "card_verification",
        "card_successful_verification",
        "card_failed_transaction",
    ];
    pub const SECURITY: &[&str] = &["DEVICE_RESET", "PIN_CHANGED", "PUK_CREATED"];
}

fn activity_item(event: &TypedEvent) -> Result<ActivityItem, DecodeError> {
    serde_json::from_value(event.payload.clone()).map_err(|e| DecodeError::Shape(e.to_string()))
}

struct FixedKind(&'static str, ActivityKind);

impl Strategy<ActivityEntry> for FixedKind {
    fn name(&self) -> &'static str {
        self.0
    }

    fn decode(&self, event: &TypedEvent) -> Result<ActivityEntry, DecodeError> {
        ActivityEntry::from_wire(activity_item(event)?, self.1)
    }
}

struct Unclassified;

impl Strategy<ActivityEntry> for Unclassified {
    fn name(&self) -> &'static str {
        "unclassified"
    }

    fn decode(&self, event: &TypedEvent) -> Result<ActivityEntry, DecodeError> {
        let mut entry = ActivityEntry::from_wire(activity_item(event)?, ActivityKind::Unclassified)?;
        entry.raw = Some(event.payload.clone());
        Ok(entry)
    }
}

/// The activity-log registry.
pub fn registry() -> Result<Registry<ActivityEntry>, ResolverError> {
    Registry::builder(Domain::ActivityLog, Unclassified)
        .register_all(tags::DOCUMENT, FixedKind("document", ActivityKind::Document))?
        .register_all(tags::ACCOUNT, FixedKind("account", ActivityKind::Account))?
        .register_all(tags::CARD, FixedKind("card", ActivityKind::Card))?
        .register_all(tags::SECURITY, FixedKind("security", ActivityKind::Security))
        .map(|b| b.build())
}
