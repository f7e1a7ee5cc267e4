//! Document download.
//!
//! Each linked document is fetched once and filed under the date it belongs
//! to: `<base>/<yyyy>/<mm>/<yyyy-mm-dd>_<title>_<id>.pdf`. A file already on
//! disk is never fetched again, so re-running an export only downloads what
//! is new.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::Document;
use crate::error::{DownloadError, HttpError};

/// Source of document bytes.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

#[cfg(feature = "native")]
#[async_trait]
impl DocumentFetcher for crate::http::ApiHttp {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.get_bytes(url, crate::http::RetryPolicy::Idempotent).await
    }
}

/// Date a document is filed under: its own date, else its owner's.
pub fn resolve_date(doc: &Document, owner_time: DateTime<Utc>) -> NaiveDate {
    doc.date.unwrap_or_else(|| owner_time.date_naive())
}

/// What [`Downloader::download`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downloaded {
    Saved(PathBuf),
    /// The file was already there.
    Present(PathBuf),
    /// The document carries no link.
    NoLink,
}

pub struct Downloader {
    fetcher: Arc<dyn DocumentFetcher>,
    base_dir: PathBuf,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, doc: &Document, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!(
                "{}_{}_{}.pdf",
                date.format("%Y-%m-%d"),
                file_part(&doc.title),
                file_part(&doc.id)
            ))
    }

    pub async fn download(
        &self,
        doc: &Document,
        owner_time: DateTime<Utc>,
    ) -> Result<Downloaded, DownloadError> {
        let Some(url) = doc.url.as_deref() else {
            return Ok(Downloaded::NoLink);
        };
        let path = self.path_for(doc, resolve_date(doc, owner_time));
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!("Document {} already at {}", doc.id, path.display());
            return Ok(Downloaded::Present(path));
        }

        let bytes = self.fetcher.fetch(url).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = path.with_extension("pdf.part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::info!("Document {} saved to {}", doc.id, path.display());
        Ok(Downloaded::Saved(path))
    }
}

/// Path-safe rendering of a title or id.
fn file_part(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() => c,
            '-' | '.' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
