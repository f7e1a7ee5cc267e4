//! Detail domain — the `timelineDetailV2` record behind a timeline item.
//!
//! A detail response is a list of display sections. Trades and payouts
//! carry their share counts and prices in table rows with localised labels
//! and values; every kind may carry a documents section.

pub mod client;
mod convert;
pub mod strategy;
pub mod wire;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::EventId;

pub use strategy::registry;

/// A document listed in a detail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
    pub postbox_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDetail {
    pub shares: Decimal,
    pub share_price: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetail {
    pub shares: Option<Decimal>,
    pub per_share: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DetailKind {
    Trade(TradeDetail),
    Payout(PayoutDetail),
    /// Cash movements: nothing beyond the documents.
    Cash,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub id: EventId,
    pub kind: DetailKind,
    pub documents: Vec<DocumentRef>,
    /// Original sections, kept for unclassified records only.
    pub raw: Option<Value>,
}
