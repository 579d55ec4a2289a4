use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::WalletResult;

/// Raw key/value contract consumed by every repository.
///
/// Values are serialized text. `create_scope` returns a view whose keys are
/// transparently prefixed, so components sharing one backend never collide.
#[async_trait]
pub trait StorageInterface: Send + Sync {
    async fn get_item(&self, key: &str) -> WalletResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> WalletResult<()>;

    async fn remove_item(&self, key: &str) -> WalletResult<()>;

    fn create_scope(self: Arc<Self>, prefix: &str) -> Arc<dyn StorageInterface>;
}

/// Prefixing view over another storage.
pub struct ScopedStorage {
    inner: Arc<dyn StorageInterface>,
    prefix: String,
}

impl ScopedStorage {
    pub fn new(inner: Arc<dyn StorageInterface>, prefix: &str) -> Self {
        Self {
            inner,
            prefix: format!("{}.", prefix.trim_end_matches('.')),
        }
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl StorageInterface for ScopedStorage {
    async fn get_item(&self, key: &str) -> WalletResult<Option<String>> {
        self.inner.get_item(&self.scoped_key(key)).await
    }

    async fn set_item(&self, key: &str, value: &str) -> WalletResult<()> {
        self.inner.set_item(&self.scoped_key(key), value).await
    }

    async fn remove_item(&self, key: &str) -> WalletResult<()> {
        self.inner.remove_item(&self.scoped_key(key)).await
    }

    fn create_scope(self: Arc<Self>, prefix: &str) -> Arc<dyn StorageInterface> {
        Arc::new(ScopedStorage::new(self, prefix))
    }
}

/// Volatile storage, used for tests and for sessions that must not persist.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl StorageInterface for MemoryStorage {
    async fn get_item(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> WalletResult<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> WalletResult<()> {
        self.items.write().remove(key);
        Ok(())
    }

    fn create_scope(self: Arc<Self>, prefix: &str) -> Arc<dyn StorageInterface> {
        Arc::new(ScopedStorage::new(self, prefix))
    }
}
