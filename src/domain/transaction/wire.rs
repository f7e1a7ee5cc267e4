//! Wire types for `timelineTransactions` list items.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A monetary amount as the timeline sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAmount {
    pub currency: String,
    pub value: serde_json::Number,
    #[serde(default)]
    pub fraction_digits: Option<u32>,
}

/// `action` of a timeline item; `timelineDetail` points at a detail record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// One item of a transactions page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub amount: Option<WireAmount>,
    #[serde(default)]
    pub sub_amount: Option<WireAmount>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub action: Option<WireAction>,
}
