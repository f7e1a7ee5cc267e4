//! Wire types for `timelineActivityLog` list items.

use serde::{Deserialize, Serialize};

pub use crate::domain::transaction::wire::WireAction;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub action: Option<WireAction>,
}
