//! Decode strategies for detail records, keyed by the parent's `eventType`.

use super::convert::Sections;
use super::wire::DetailResponse;
use super::{DetailKind, DetailRecord, PayoutDetail, TradeDetail};
use crate::domain::transaction::strategy::tags;
use crate::error::{DecodeError, ResolverError};
use crate::resolver::{Domain, Registry, Strategy, TypedEvent};
use crate::shared::{EventId, NumberFormat};

/// Row labels in the locales the timeline renders.
mod labels {
    pub const SHARES: &[&str] = &["Anteile", "Aktien", "Shares"];
    pub const SHARE_PRICE: &[&str] = &["Aktienkurs", "Anteilspreis", "Kurs", "Share price", "Price"];
    pub const PER_SHARE: &[&str] = &[
        "Dividende je Aktie",
        "Ausschüttung je Anteil",
        "Dividend per share",
        "Payout per share",
    ];
    pub const FEE: &[&str] = &["Gebühr", "Fremdkostenzuschlag", "Fee"];
    pub const TAX: &[&str] = &["Steuer", "Steuern", "Tax", "Taxes"];
    pub const TOTAL: &[&str] = &["Gesamt", "Summe", "Total"];
}

fn parse(event: &TypedEvent) -> Result<(DetailResponse, Sections), DecodeError> {
    let resp: DetailResponse =
        serde_json::from_value(event.payload.clone()).map_err(|e| DecodeError::Shape(e.to_string()))?;
    let sections = Sections::from_response(&resp)?;
    Ok((resp, sections))
}

fn record(resp: DetailResponse, kind: DetailKind, sections: Sections) -> DetailRecord {
    DetailRecord {
        id: EventId::new(resp.id),
        kind,
        documents: sections.documents,
        raw: None,
    }
}

struct TradeDetails {
    format: NumberFormat,
}

impl Strategy<DetailRecord> for TradeDetails {
    fn name(&self) -> &'static str {
        "trade_detail"
    }

    fn decode(&self, event: &TypedEvent) -> Result<DetailRecord, DecodeError> {
        let (resp, s) = parse(event)?;
        let f = self.format;
        let trade = TradeDetail {
            shares: s
                .amount("shares", labels::SHARES, f)?
                .ok_or_else(|| DecodeError::missing("shares"))?,
            share_price: s.amount("share_price", labels::SHARE_PRICE, f)?,
            fee: s.amount("fee", labels::FEE, f)?,
            tax: s.amount("tax", labels::TAX, f)?,
            total: s.amount("total", labels::TOTAL, f)?,
        };
        Ok(record(resp, DetailKind::Trade(trade), s))
    }
}

struct PayoutDetails {
    format: NumberFormat,
}

impl Strategy<DetailRecord> for PayoutDetails {
    fn name(&self) -> &'static str {
        "payout_detail"
    }

    fn decode(&self, event: &TypedEvent) -> Result<DetailRecord, DecodeError> {
        let (resp, s) = parse(event)?;
        let f = self.format;
        let payout = PayoutDetail {
            shares: s.amount("shares", labels::SHARES, f)?,
            per_share: s.amount("per_share", labels::PER_SHARE, f)?,
            tax: s.amount("tax", labels::TAX, f)?,
            total: s.amount("total", labels::TOTAL, f)?,
        };
        Ok(record(resp, DetailKind::Payout(payout), s))
    }
}

struct CashDetails;

impl Strategy<DetailRecord> for CashDetails {
    fn name(&self) -> &'static str {
        "cash_detail"
    }

    fn decode(&self, event: &TypedEvent) -> Result<DetailRecord, DecodeError> {
        let (resp, s) = parse(event)?;
        Ok(record(resp, DetailKind::Cash, s))
    }
}

struct GenericDetails;

impl Strategy<DetailRecord> for GenericDetails {
    fn name(&self) -> &'static str {
        "generic_detail"
    }

    fn decode(&self, event: &TypedEvent) -> Result<DetailRecord, DecodeError> {
        let (resp, s) = parse(event)?;
        let raw = serde_json::to_value(&resp.sections).ok();
        let mut rec = record(resp, DetailKind::Unclassified, s);
        rec.raw = raw;
        Ok(rec)
    }
}

/// The details registry. `format` is the request locale's number format.
pub fn registry(format: NumberFormat) -> Result<Registry<DetailRecord>, ResolverError> {
    let trade_tags = [tags::TRADE, tags::SAVINGS_PLAN, tags::ROUND_UP, tags::SAVEBACK].concat();
    let cash_tags = [
        tags::DEPOSIT,
        tags::WITHDRAWAL,
        tags::INTEREST,
        tags::CARD,
        tags::TAX_REFUND,
    ]
    .concat();

    Registry::builder(Domain::Details, GenericDetails)
        .register_all(&trade_tags, TradeDetails { format })?
        .register_all(tags::DIVIDEND, PayoutDetails { format })?
        .register_all(&cash_tags, CashDetails)
        .map(|b| b.build())
}
