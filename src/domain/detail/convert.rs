//! Conversions: detail sections → flat rows and document references.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::wire::{DetailResponse, TableRow, WireDocument};
use super::DocumentRef;
use crate::error::DecodeError;
use crate::shared::serde_util::parse_document_date;
use crate::shared::{parse_localized_decimal, NumberFormat};

impl From<WireDocument> for DocumentRef {
    fn from(w: WireDocument) -> Self {
        let url = w
            .action
            .and_then(|a| a.payload)
            .and_then(|p| p.as_str().map(str::to_string));
        Self {
            date: w.detail.as_deref().and_then(parse_document_date),
            id: w.id,
            title: w.title,
            url,
            postbox_type: w.postbox_type,
        }
    }
}

/// Table rows (label → display text) and documents of one response.
#[derive(Debug, Default)]
pub(crate) struct Sections {
    rows: Vec<(String, String)>,
    pub(crate) documents: Vec<DocumentRef>,
}

fn section_data<T: DeserializeOwned>(kind: &str, data: &Value) -> Result<Vec<T>, DecodeError> {
    match data {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other.clone())
            .map_err(|e| DecodeError::invalid(format!("sections.{}", kind), e)),
    }
}

impl Sections {
    pub(crate) fn from_response(resp: &DetailResponse) -> Result<Self, DecodeError> {
        let mut out = Sections::default();
        for section in &resp.sections {
            match section.section_type.as_str() {
                "table" => {
                    for row in section_data::<TableRow>("table", &section.data)? {
                        if let Some(text) = row.detail.and_then(|d| d.text) {
                            out.rows.push((row.title, text));
                        }
                    }
                }
                "documents" => {
                    let docs = section_data::<WireDocument>("documents", &section.data)?;
                    out.documents.extend(docs.into_iter().map(DocumentRef::from));
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Text of the first row whose label matches one of `labels`.
    pub(crate) fn text(&self, labels: &[&str]) -> Option<&str> {
        self.rows
            .iter()
            .find(|(title, _)| labels.iter().any(|l| title.trim().eq_ignore_ascii_case(l)))
            .map(|(_, text)| text.as_str())
    }

    /// Numeric row value. Rows without digits (`Free`, `Kostenlos`) read as absent.
    pub(crate) fn amount(
        &self,
        field: &str,
        labels: &[&str],
        format: NumberFormat,
    ) -> Result<Option<Decimal>, DecodeError> {
        match self.text(labels) {
            Some(text) if text.chars().any(|c| c.is_ascii_digit()) => parse_localized_decimal(text, format)
                .map(Some)
                .map_err(|e| DecodeError::invalid(field, e)),
            _ => Ok(None),
        }
    }
}
