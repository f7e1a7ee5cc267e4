//! Conversions: wire types → domain types.

use super::wire::ActivityItem;
use super::{ActivityEntry, ActivityKind};
use crate::error::DecodeError;
use crate::shared::serde_util::parse_timestamp;
use crate::shared::EventId;

impl ActivityEntry {
    pub(crate) fn from_wire(item: ActivityItem, kind: ActivityKind) -> Result<Self, DecodeError> {
        if item.id.is_empty() {
            return Err(DecodeError::invalid("id", "empty id"));
        }
        let timestamp = parse_timestamp(&item.timestamp)
            .ok_or_else(|| DecodeError::invalid("timestamp", &item.timestamp))?;
        Ok(Self {
            id: EventId::new(item.id),
            kind,
            event_type: item.event_type,
            timestamp,
            title: item.title.unwrap_or_default(),
            subtitle: item.subtitle,
            has_detail: item
                .action
                .map(|a| a.action_type == "timelineDetail")
                .unwrap_or(false),
            raw: None,
        })
    }
}
