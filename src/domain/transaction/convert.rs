//! Conversions: wire types → domain types.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::wire::{TimelineItem, WireAmount};
use super::{TransactionEntry, TransactionKind};
use crate::error::DecodeError;
use crate::shared::serde_util::parse_timestamp;
use crate::shared::{EventId, Money};

/// The action type linking an item to its detail record.
const DETAIL_ACTION: &str = "timelineDetail";

pub(crate) fn decimal_from_number(field: &str, n: &serde_json::Number) -> Result<Decimal, DecodeError> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| DecodeError::invalid(field, e))
}

impl TryFrom<&WireAmount> for Money {
    type Error = DecodeError;

    fn try_from(w: &WireAmount) -> Result<Self, Self::Error> {
        if w.currency.trim().is_empty() {
            return Err(DecodeError::invalid("amount.currency", "empty currency"));
        }
        let value = decimal_from_number("amount.value", &w.value)?;
        Ok(Money::new(value, w.currency.clone()))
    }
}

impl TransactionEntry {
    pub(crate) fn from_wire(item: TimelineItem, kind: TransactionKind) -> Result<Self, DecodeError> {
        if item.id.is_empty() {
            return Err(DecodeError::invalid("id", "empty id"));
        }
        let timestamp = parse_timestamp(&item.timestamp)
            .ok_or_else(|| DecodeError::invalid("timestamp", &item.timestamp))?;
        let amount = item.amount.as_ref().map(Money::try_from).transpose()?;
        let has_detail = item
            .action
            .as_ref()
            .map(|a| a.action_type == DETAIL_ACTION)
            .unwrap_or(false);

        Ok(Self {
            id: EventId::new(item.id),
            kind,
            event_type: item.event_type,
            timestamp,
            status: item.status,
            title: item.title.unwrap_or_default(),
            subtitle: item.subtitle,
            amount,
            icon: item.icon,
            has_detail,
            raw: None,
        })
    }
}
