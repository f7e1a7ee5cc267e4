//! Decode strategies for transaction events, keyed by `eventType`.

use super::wire::TimelineItem;
use super::{TransactionEntry, TransactionKind};
use crate::error::{DecodeError, ResolverError};
use crate::resolver::{Domain, Registry, Strategy, TypedEvent};

/// Known `eventType` values, grouped by the kind they decode to.
pub mod tags {
    pub const DEPOSIT: &[&str] = &[
        "PAYMENT_INBOUND",
        "PAYMENT_INBOUND_SEPA_DIRECT_DEBIT",
        "PAYMENT_INBOUND_GOOGLE_PAY",
        "PAYMENT_INBOUND_APPLE_PAY",
        "PAYMENT_INBOUND_CREDIT_CARD",
        "INCOMING_TRANSFER",
        "INCOMING_TRANSFER_DELEGATION",
    ];
    pub const WITHDRAWAL: &[&str] = &[
        "PAYMENT_OUTBOUND",
        "OUTGOING_TRANSFER",
        "OUTGOING_TRANSFER_DELEGATION",
    ];
    /// Buy or sell; the amount's sign decides.
    pub const TRADE: &[&str] = &["ORDER_EXECUTED", "TRADE_INVOICE", "TRADING_TRADE_EXECUTED"];
    pub const SAVINGS_PLAN: &[&str] = &[
        "SAVINGS_PLAN_EXECUTED",
        "SAVINGS_PLAN_INVOICE_CREATED",
        "trading_savingsplan_executed",
    ];
    pub const ROUND_UP: &[&str] = &["benefits_spare_change_execution"];
    pub const SAVEBACK: &[&str] = &["benefits_saveback_execution"];
    pub const DIVIDEND: &[&str] = &["CREDIT", "ssp_corporate_action_invoice_cash"];
    pub const INTEREST: &[&str] = &["INTEREST_PAYOUT", "INTEREST_PAYOUT_CREATED"];
    pub const CARD: &[&str] = &["card_successful_transaction"];
    pub const TAX_REFUND: &[&str] = &["TAX_REFUND", "ssp_tax_correction_invoice"];
}

fn timeline_item(event: &TypedEvent) -> Result<TimelineItem, DecodeError> {
    serde_json::from_value(event.payload.clone()).map_err(|e| DecodeError::Shape(e.to_string()))
}

/// Maps a tag group to a single kind.
struct FixedKind {
    name: &'static str,
    kind: TransactionKind,
    requires_amount: bool,
}

impl Strategy<TransactionEntry> for FixedKind {
    fn name(&self) -> &'static str {
        self.name
    }

    fn decode(&self, event: &TypedEvent) -> Result<TransactionEntry, DecodeError> {
        let entry = TransactionEntry::from_wire(timeline_item(event)?, self.kind)?;
        if self.requires_amount && entry.amount.is_none() {
            return Err(DecodeError::missing("amount"));
        }
        Ok(entry)
    }
}

/// Purchase when money leaves the account, sale otherwise.
struct SignedTrade;

impl Strategy<TransactionEntry> for SignedTrade {
    fn name(&self) -> &'static str {
        "trade"
    }

    fn decode(&self, event: &TypedEvent) -> Result<TransactionEntry, DecodeError> {
        let mut entry = TransactionEntry::from_wire(timeline_item(event)?, TransactionKind::Purchase)?;
        let amount = entry.amount.as_ref().ok_or_else(|| DecodeError::missing("amount"))?;
        if !amount.is_negative() {
            entry.kind = TransactionKind::Sale;
        }
        Ok(entry)
    }
}

/// Fallback: the common fields plus the untouched payload.
struct Unclassified;

impl Strategy<TransactionEntry> for Unclassified {
    fn name(&self) -> &'static str {
        "unclassified"
    }

    fn decode(&self, event: &TypedEvent) -> Result<TransactionEntry, DecodeError> {
        let mut entry = TransactionEntry::from_wire(timeline_item(event)?, TransactionKind::Unclassified)?;
        entry.raw = Some(event.payload.clone());
        Ok(entry)
    }
}

fn fixed(name: &'static str, kind: TransactionKind, requires_amount: bool) -> FixedKind {
    FixedKind {
        name,
        kind,
        requires_amount,
    }
}

/// The transactions registry.
pub fn registry() -> Result<Registry<TransactionEntry>, ResolverError> {
    use TransactionKind as K;

    Registry::builder(Domain::Transactions, Unclassified)
        .register_all(tags::DEPOSIT, fixed("deposit", K::Deposit, true))?
        .register_all(tags::WITHDRAWAL, fixed("withdrawal", K::Withdrawal, true))?
        .register_all(tags::TRADE, SignedTrade)?
        .register_all(tags::SAVINGS_PLAN, fixed("savings_plan", K::SavingsPlan, true))?
        .register_all(tags::ROUND_UP, fixed("round_up", K::RoundUp, true))?
        .register_all(tags::SAVEBACK, fixed("saveback", K::Saveback, true))?
        .register_all(tags::DIVIDEND, fixed("dividend", K::Dividend, true))?
        .register_all(tags::INTEREST, fixed("interest_payout", K::InterestPayout, true))?
        .register_all(tags::CARD, fixed("card_payment", K::CardPayment, true))?
        .register_all(tags::TAX_REFUND, fixed("tax_refund", K::TaxRefund, false))
        .map(|b| b.build())
}
