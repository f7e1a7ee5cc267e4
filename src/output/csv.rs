//! CSV export of finished models.

use serde::Serialize;

use super::{Sink, Writer};
use crate::domain::activity::Activity;
use crate::domain::transaction::Transaction;
use crate::error::OutputError;

/// A model with a flat CSV row.
pub trait CsvRow {
    type Row: Serialize;

    fn csv_row(&self) -> Self::Row;
}

/// Writes one CSV row per delivered model; the header precedes the first row.
pub struct CsvSink {
    writer: Box<dyn Writer>,
    header_written: bool,
}

impl CsvSink {
    pub fn new(writer: impl Writer + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            header_written: false,
        }
    }
}

impl<M: CsvRow> Sink<M> for CsvSink {
    fn deliver(&mut self, model: &M) -> Result<(), OutputError> {
        let mut csv = ::csv::WriterBuilder::new()
            .has_headers(!self.header_written)
            .from_writer(Vec::new());
        csv.serialize(model.csv_row())?;
        let bytes = csv.into_inner().map_err(|e| OutputError::Io(e.into_error()))?;
        self.writer.write(&bytes)?;
        self.header_written = true;
        Ok(())
    }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TransactionRow {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub event_type: String,
    pub status: String,
    pub title: String,
    pub isin: String,
    pub amount: String,
    pub currency: String,
    pub shares: String,
    pub rate: String,
    pub fee: String,
    pub tax: String,
    pub total: String,
    pub documents: String,
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl CsvRow for Transaction {
    type Row = TransactionRow;

    fn csv_row(&self) -> TransactionRow {
        TransactionRow {
            date: self.timestamp.to_rfc3339(),
            kind: self.kind.as_str(),
            id: self.id.to_string(),
            event_type: self.event_type.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            title: self.title.clone(),
            isin: opt(&self.isin),
            amount: opt(&self.amount.as_ref().map(|m| m.value)),
            currency: opt(&self.amount.as_ref().map(|m| m.currency.clone())),
            shares: opt(&self.shares),
            rate: opt(&self.rate),
            fee: opt(&self.fee),
            tax: opt(&self.tax),
            total: opt(&self.total),
            documents: self.document_ids.join(";"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityRow {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub event_type: String,
    pub title: String,
    pub subtitle: String,
    pub documents: String,
}

impl CsvRow for Activity {
    type Row = ActivityRow;

    fn csv_row(&self) -> ActivityRow {
        ActivityRow {
            date: self.timestamp.to_rfc3339(),
            kind: self.kind.as_str(),
            id: self.id.to_string(),
            event_type: self.event_type.clone().unwrap_or_default(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone().unwrap_or_default(),
            documents: self.document_ids.join(";"),
        }
    }
}
