use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::interface::StorageInterface;
use crate::errors::WalletResult;

/// Typed accessor over a (usually scoped) storage backend.
///
/// Reads never fail on content: a missing key and an undecodable value both
/// come back as `None`. Backend I/O errors still propagate.
#[derive(Clone)]
pub struct StorageRepository {
    storage: Arc<dyn StorageInterface>,
}

impl StorageRepository {
    pub fn new(storage: Arc<dyn StorageInterface>) -> Self {
        Self { storage }
    }

    pub fn create_scope(&self, prefix: &str) -> Self {
        Self {
            storage: self.storage.clone().create_scope(prefix),
        }
    }

    pub fn interface(&self) -> Arc<dyn StorageInterface> {
        self.storage.clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> WalletResult<Option<T>> {
        let Some(raw) = self.storage.get_item(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Discarding undecodable value for '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> WalletResult<()> {
        let serialized = serde_json::to_string(value)?;
        self.storage.set_item(key, &serialized).await
    }

    /// Store `Some` values, remove the key for `None`.
    pub async fn set_optional<T: Serialize>(&self, key: &str, value: Option<&T>) -> WalletResult<()> {
        match value {
            Some(value) => self.set(key, value).await,
            None => self.remove(key).await,
        }
    }

    pub async fn remove(&self, key: &str) -> WalletResult<()> {
        self.storage.remove_item(key).await
    }

    pub async fn remove_all(&self, keys: &[&str]) -> WalletResult<()> {
        for key in keys {
            self.storage.remove_item(key).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for StorageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn undecodable_values_read_as_absent() {
        let backend = Arc::new(MemoryStorage::new());
        let repository = StorageRepository::new(backend.clone()).create_scope("controller");
        backend
            .set_item("controller.accounts", "{broken")
            .await
            .unwrap();

        let accounts: Option<Vec<String>> = repository.get("accounts").await.unwrap();
        assert!(accounts.is_none());

        repository.set("accounts", &vec!["a".to_string()]).await.unwrap();
        let accounts: Option<Vec<String>> = repository.get("accounts").await.unwrap();
        assert_eq!(accounts, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn set_optional_removes_on_none() {
        let backend = Arc::new(MemoryStorage::new());
        let repository = StorageRepository::new(backend.clone());
        repository.set_optional("node", Some(&"http://a")).await.unwrap();
        assert_eq!(backend.len(), 1);
        repository.set_optional::<String>("node", None).await.unwrap();
        assert!(backend.is_empty());
    }
}
