//! Persistence of finished models.
//!
//! Repositories are keyed by [`Identifiable::key`] and upsert on save, so a
//! re-run over the same timeline overwrites instead of duplicating.

pub mod json_file;
pub mod memory;

use async_trait::async_trait;

use crate::error::StorageError;

pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;

/// A model with a stable storage key.
pub trait Identifiable {
    fn key(&self) -> &str;
}

/// Keyed store for one model type.
#[async_trait]
pub trait Repository<T: Send + Sync>: Send + Sync {
    /// Insert or replace by key.
    async fn save(&self, item: &T) -> Result<(), StorageError>;

    async fn find(&self, key: &str) -> Result<Option<T>, StorageError>;

    /// All items, ordered by key.
    async fn list(&self) -> Result<Vec<T>, StorageError>;

    /// Write out anything still buffered.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
