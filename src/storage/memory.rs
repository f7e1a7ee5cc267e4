//! In-process repository.

use std::collections::BTreeMap;

use async_lock::RwLock;
use async_trait::async_trait;

use super::{Identifiable, Repository};
use crate::error::StorageError;

pub struct MemoryRepository<T> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Repository<T> for MemoryRepository<T>
where
    T: Identifiable + Clone + Send + Sync,
{
    async fn save(&self, item: &T) -> Result<(), StorageError> {
        self.items
            .write()
            .await
            .insert(item.key().to_string(), item.clone());
        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<T>, StorageError> {
        Ok(self.items.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String, u32);

    impl Identifiable for Item {
        fn key(&self) -> &str {
            &self.0
        }
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = MemoryRepository::new();
        repo.save(&Item("b".into(), 1)).await.unwrap();
        repo.save(&Item("a".into(), 1)).await.unwrap();
        repo.save(&Item("b".into(), 2)).await.unwrap();

        assert_eq!(repo.len().await, 2);
        assert_eq!(repo.find("b").await.unwrap(), Some(Item("b".into(), 2)));
        assert_eq!(repo.find("c").await.unwrap(), None);
        let keys: Vec<_> = repo.list().await.unwrap().into_iter().map(|i| i.0).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
