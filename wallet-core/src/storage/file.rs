use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::interface::{ScopedStorage, StorageInterface};
use crate::errors::{WalletError, WalletResult};

/// Key/value storage persisted as one JSON document on disk.
///
/// Every write replaces the file atomically (temp file, fsync, rename), so a
/// crash leaves either the previous or the new document, never a torn one.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Default file name when opening a storage inside a directory.
    pub const DEFAULT_FILENAME: &'static str = "wallet.store.json";

    pub fn open(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Storage path cannot be empty".to_string(),
            ));
        }

        let items = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                WalletError::StorageError(format!(
                    "Storage file {} is corrupted: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn open_in_dir(dir: impl AsRef<Path>) -> WalletResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Self::open(dir.join(Self::DEFAULT_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> WalletResult<()> {
        let serialized = serde_json::to_vec_pretty(items)?;
        let dir = self
            .path
            .parent()
            .ok_or_else(|| WalletError::StorageError("Invalid storage path".to_string()))?;
        fs::create_dir_all(dir)?;

        let tmp_path = self.path.with_extension("new");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    fn mutate<F>(&self, op: F) -> WalletResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut items = self.items.lock();
        let mut next = items.clone();
        op(&mut next);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

#[async_trait]
impl StorageInterface for FileStorage {
    async fn get_item(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> WalletResult<()> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove_item(&self, key: &str) -> WalletResult<()> {
        self.mutate(|items| {
            items.remove(key);
        })
    }

    fn create_scope(self: Arc<Self>, prefix: &str) -> Arc<dyn StorageInterface> {
        Arc::new(ScopedStorage::new(self, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::open_in_dir(temp.path()).unwrap();
        storage.set_item("controller.networkIdentifier", "\"testnet\"").await.unwrap();
        storage.set_item("scratch", "1").await.unwrap();
        storage.remove_item("scratch").await.unwrap();

        let reopened = FileStorage::open_in_dir(temp.path()).unwrap();
        assert_eq!(
            reopened
                .get_item("controller.networkIdentifier")
                .await
                .unwrap()
                .as_deref(),
            Some("\"testnet\"")
        );
        assert_eq!(reopened.get_item("scratch").await.unwrap(), None);
        assert!(!reopened.path().with_extension("new").exists());
    }

    #[test]
    fn corrupted_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();
        let result = FileStorage::open(&path);
        assert!(matches!(result, Err(WalletError::StorageError(_))));
    }
}
