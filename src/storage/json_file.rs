//! Repository backed by one JSON file per model type.
//!
//! The whole table is kept in memory. Saves are batched: the file is
//! rewritten once every `flush_every` saves and on [`Repository::flush`],
//! not per record. Each write goes to a sibling temp file first and is then
//! renamed over the target, so a crash never leaves a truncated file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_lock::RwLock;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Identifiable, Repository};
use crate::error::StorageError;

const DEFAULT_FLUSH_EVERY: usize = 256;

struct Table<T> {
    items: BTreeMap<String, T>,
    /// Saves not yet on disk.
    unsaved: usize,
}

pub struct JsonFileRepository<T> {
    path: PathBuf,
    flush_every: usize,
    /// `None` until the file has been read.
    table: RwLock<Option<Table<T>>>,
}

impl<T> JsonFileRepository<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_every: DEFAULT_FLUSH_EVERY,
            table: RwLock::new(None),
        }
    }

    /// Rewrite the file after this many unsaved records (at least 1).
    pub fn with_flush_every(mut self, saves: usize) -> Self {
        self.flush_every = saves.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Result<Table<T>, StorageError> {
        let items = match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Table { items, unsaved: 0 })
    }

    async fn persist(&self, table: &mut Table<T>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&table.items)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("{}: wrote {} records", self.path.display(), table.items.len());
        table.unsaved = 0;
        Ok(())
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, T>, StorageError> {
        if let Some(table) = self.table.read().await.as_ref() {
            return Ok(table.items.clone());
        }
        let mut guard = self.table.write().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        Ok(guard.as_ref().map(|t| t.items.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl<T> Repository<T> for JsonFileRepository<T>
where
    T: Identifiable + Serialize + DeserializeOwned + Clone + Send + Sync,
{
    async fn save(&self, item: &T) -> Result<(), StorageError> {
        let mut guard = self.table.write().await;
        let mut table = match guard.take() {
            Some(table) => table,
            None => Self::load(&self.path).await?,
        };
        table.items.insert(item.key().to_string(), item.clone());
        table.unsaved += 1;
        let result = if table.unsaved >= self.flush_every {
            self.persist(&mut table).await
        } else {
            Ok(())
        };
        *guard = Some(table);
        result
    }

    async fn find(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self.snapshot().await?.remove(key))
    }

    async fn list(&self) -> Result<Vec<T>, StorageError> {
        Ok(self.snapshot().await?.into_values().collect())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let mut guard = self.table.write().await;
        match guard.as_mut() {
            Some(table) if table.unsaved > 0 => self.persist(table).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        n: u32,
    }

    impl Identifiable for Item {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, n: u32) -> Item {
        Item { id: id.into(), n }
    }

    async fn on_disk(path: &Path) -> usize {
        let reopened: JsonFileRepository<Item> = JsonFileRepository::new(path);
        reopened.list().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("items.json");

        let repo = JsonFileRepository::new(&path);
        repo.save(&item("x", 1)).await.unwrap();
        repo.save(&item("x", 2)).await.unwrap();
        repo.save(&item("y", 3)).await.unwrap();
        repo.flush().await.unwrap();

        let reopened: JsonFileRepository<Item> = JsonFileRepository::new(&path);
        assert_eq!(reopened.find("x").await.unwrap(), Some(item("x", 2)));
        assert_eq!(reopened.list().await.unwrap().len(), 2);
        assert!(!dir.path().join("nested").join("items.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_saves_are_batched_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        let repo = JsonFileRepository::new(&path).with_flush_every(3);

        repo.save(&item("a", 1)).await.unwrap();
        repo.save(&item("b", 1)).await.unwrap();
        assert!(!path.exists());
        assert_eq!(repo.list().await.unwrap().len(), 2);

        repo.save(&item("c", 1)).await.unwrap();
        assert_eq!(on_disk(&path).await, 3);

        repo.save(&item("d", 1)).await.unwrap();
        assert_eq!(on_disk(&path).await, 3);
        assert_eq!(repo.find("d").await.unwrap(), Some(item("d", 1)));

        repo.flush().await.unwrap();
        assert_eq!(on_disk(&path).await, 4);
    }

    #[tokio::test]
    async fn test_flush_without_saves_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        let repo: JsonFileRepository<Item> = JsonFileRepository::new(&path);
        repo.flush().await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
        repo.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo: JsonFileRepository<Item> = JsonFileRepository::new(dir.path().join("none.json"));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let repo: JsonFileRepository<Item> = JsonFileRepository::new(&path);
        assert!(matches!(repo.find("x").await, Err(StorageError::Serde(_))));
    }
}
