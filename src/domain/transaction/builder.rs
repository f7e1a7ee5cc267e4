//! Merges a decoded entry with its detail record into a [`TransactionBundle`].

use std::sync::Arc;

use super::{Transaction, TransactionBundle, TransactionEntry};
use crate::domain::detail::{DetailKind, DetailRecord};
use crate::domain::document::Document;
use crate::domain::instrument::Instrument;
use crate::error::DecodeError;
use crate::storage::{Identifiable, Repository};

pub struct TransactionBuilder {
    instruments: Arc<dyn Repository<Instrument>>,
}

impl TransactionBuilder {
    /// `instruments` is consulted to flag instruments seen for the first time.
    pub fn new(instruments: Arc<dyn Repository<Instrument>>) -> Self {
        Self { instruments }
    }

    pub async fn build(
        &self,
        entry: TransactionEntry,
        detail: Option<DetailRecord>,
    ) -> Result<TransactionBundle, DecodeError> {
        if let Some(d) = &detail {
            if d.id != entry.id {
                return Err(DecodeError::Shape(format!(
                    "detail {} does not belong to transaction {}",
                    d.id, entry.id
                )));
            }
        }

        let instrument = entry
            .icon
            .as_deref()
            .and_then(|icon| Instrument::from_icon(icon, entry.title.clone()));
        let new_instrument = match &instrument {
            Some(inst) => self.is_new(inst).await,
            None => false,
        };

        let mut transaction = Transaction {
            id: entry.id,
            kind: entry.kind,
            event_type: entry.event_type,
            timestamp: entry.timestamp,
            status: entry.status,
            title: entry.title,
            subtitle: entry.subtitle,
            isin: instrument.as_ref().map(|i| i.isin.clone()),
            amount: entry.amount,
            shares: None,
            rate: None,
            fee: None,
            tax: None,
            total: None,
            document_ids: Vec::new(),
            raw: entry.raw,
        };

        let mut documents = Vec::new();
        if let Some(detail) = detail {
            match detail.kind {
                DetailKind::Trade(t) => {
                    transaction.shares = Some(t.shares);
                    transaction.rate = t.share_price;
                    transaction.fee = t.fee;
                    transaction.tax = t.tax;
                    transaction.total = t.total;
                }
                DetailKind::Payout(p) => {
                    transaction.shares = p.shares;
                    transaction.rate = p.per_share;
                    transaction.tax = p.tax;
                    transaction.total = p.total;
                }
                DetailKind::Cash | DetailKind::Unclassified => {}
            }
            documents = detail
                .documents
                .iter()
                .map(|d| Document::link(&transaction.id, d))
                .collect();
            transaction.document_ids = documents.iter().map(|d: &Document| d.id.clone()).collect();
        }

        Ok(TransactionBundle {
            transaction,
            instrument,
            new_instrument,
            documents,
        })
    }

    async fn is_new(&self, instrument: &Instrument) -> bool {
        match self.instruments.find(instrument.key()).await {
            Ok(found) => found.is_none(),
            Err(e) => {
                tracing::warn!("Instrument lookup for {} failed: {}", instrument.isin, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detail::{DocumentRef, TradeDetail};
    use crate::domain::transaction::TransactionKind;
    use crate::shared::{EventId, Isin, Money};
    use crate::storage::MemoryRepository;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn entry(id: &str) -> TransactionEntry {
        TransactionEntry {
            id: EventId::new(id),
            kind: TransactionKind::Purchase,
            event_type: Some("ORDER_EXECUTED".into()),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            status: Some("EXECUTED".into()),
            title: "Apple".into(),
            subtitle: None,
            amount: Some(Money::new(Decimal::new(-100, 0), "EUR")),
            icon: Some("logos/US0378331005/v2".into()),
            has_detail: true,
            raw: None,
        }
    }

    fn trade_detail(id: &str) -> DetailRecord {
        DetailRecord {
            id: EventId::new(id),
            kind: DetailKind::Trade(TradeDetail {
                shares: Decimal::new(2, 0),
                share_price: Some(Decimal::new(50, 0)),
                ..TradeDetail::default()
            }),
            documents: vec![DocumentRef {
                id: "d-1".into(),
                title: "Abrechnung".into(),
                url: None,
                date: None,
                postbox_type: None,
            }],
            raw: None,
        }
    }

    #[tokio::test]
    async fn test_build_merges_detail_and_flags_new_instrument() {
        let repo = Arc::new(MemoryRepository::<Instrument>::new());
        let builder = TransactionBuilder::new(repo.clone());

        let bundle = builder.build(entry("t-1"), Some(trade_detail("t-1"))).await.unwrap();
        assert_eq!(bundle.transaction.shares, Some(Decimal::new(2, 0)));
        assert_eq!(bundle.transaction.rate, Some(Decimal::new(50, 0)));
        assert_eq!(bundle.transaction.isin, Isin::parse("US0378331005"));
        assert_eq!(bundle.transaction.document_ids, vec!["d-1"]);
        assert_eq!(bundle.documents[0].owner_id.as_str(), "t-1");
        assert!(bundle.new_instrument);

        repo.save(bundle.instrument.as_ref().unwrap()).await.unwrap();
        let again = builder.build(entry("t-2"), None).await.unwrap();
        assert!(!again.new_instrument);
        assert!(again.documents.is_empty());
    }

    #[tokio::test]
    async fn test_detail_for_other_event_is_rejected() {
        let builder = TransactionBuilder::new(Arc::new(MemoryRepository::new()));
        let err = builder.build(entry("t-1"), Some(trade_detail("t-9"))).await.unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }
}
