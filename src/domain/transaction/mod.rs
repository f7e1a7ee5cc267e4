//! Transaction domain — money movements and trades from the timeline.

pub mod builder;
pub mod client;
mod convert;
pub mod strategy;
pub mod wire;

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::document::Document;
use crate::domain::instrument::Instrument;
use crate::shared::{EventId, Isin, Money};
use crate::storage::Identifiable;

pub use builder::TransactionBuilder;
pub use strategy::registry;

/// Classification of a timeline transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Purchase,
    Sale,
    SavingsPlan,
    RoundUp,
    Saveback,
    Dividend,
    InterestPayout,
    CardPayment,
    TaxRefund,
    /// No strategy knew the event type; the raw payload is kept.
    Unclassified,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Sale => "sale",
            TransactionKind::SavingsPlan => "savings_plan",
            TransactionKind::RoundUp => "round_up",
            TransactionKind::Saveback => "saveback",
            TransactionKind::Dividend => "dividend",
            TransactionKind::InterestPayout => "interest_payout",
            TransactionKind::CardPayment => "card_payment",
            TransactionKind::TaxRefund => "tax_refund",
            TransactionKind::Unclassified => "unclassified",
        }
    }

    /// Kinds that move securities and carry share counts in their details.
    pub fn is_trade(&self) -> bool {
        matches!(
            self,
            TransactionKind::Purchase
                | TransactionKind::Sale
                | TransactionKind::SavingsPlan
                | TransactionKind::RoundUp
                | TransactionKind::Saveback
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded list item, before its detail record is merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEntry {
    pub id: EventId,
    pub kind: TransactionKind,
    pub event_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub amount: Option<Money>,
    pub icon: Option<String>,
    /// True when the item links to a `timelineDetail` record.
    pub has_detail: bool,
    /// Original payload, kept for unclassified entries only.
    pub raw: Option<Value>,
}

/// A finished transaction, as persisted and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: EventId,
    pub kind: TransactionKind,
    pub event_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub isin: Option<Isin>,
    pub amount: Option<Money>,
    pub shares: Option<Decimal>,
    /// Share price for trades, payout per share for dividends.
    pub rate: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
    pub document_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Everything one transaction event produces.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBundle {
    pub transaction: Transaction,
    pub instrument: Option<Instrument>,
    /// The instrument was not in the repository when the bundle was built.
    pub new_instrument: bool,
    pub documents: Vec<Document>,
}

impl Identifiable for Transaction {
    fn key(&self) -> &str {
        self.id.as_str()
    }
}
