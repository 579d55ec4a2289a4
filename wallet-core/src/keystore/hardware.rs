use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::SecretString;
use zeroize::Zeroizing;

use super::{Keystore, KeystoreContext};
use crate::account::{position_of, AccountType, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::{KeystoreErrorCode, WalletError, WalletResult};
use crate::network_map::NetworkMap;
use crate::storage::StorageRepository;

const ACCOUNTS_KEY: &str = "accounts";

/// External signer (ledger-style device). Keys never leave the device.
#[async_trait]
pub trait HardwareDevice: Send + Sync {
    /// Public account the device derives at `index` for a network.
    async fn get_account(
        &self,
        network_identifier: &str,
        index: u32,
    ) -> WalletResult<WalletAccount>;

    async fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &WalletAccount,
    ) -> WalletResult<SignedTransaction>;

    async fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &WalletAccount,
    ) -> WalletResult<Cosignature>;
}

/// Keystore whose accounts are public-only records of a hardware device.
pub struct HardwareKeystore {
    storage: StorageRepository,
    device: Arc<dyn HardwareDevice>,
    networks: Vec<String>,
    accounts: RwLock<NetworkMap<Vec<WalletAccount>>>,
}

impl HardwareKeystore {
    pub const STORAGE_SCOPE: &'static str = "keystore.hardware";

    pub fn new(ctx: &KeystoreContext, device: Arc<dyn HardwareDevice>) -> Self {
        Self {
            storage: ctx.persistent_storage.create_scope(Self::STORAGE_SCOPE),
            device,
            networks: ctx.networks.clone(),
            accounts: RwLock::new(NetworkMap::with_defaults(&ctx.networks)),
        }
    }

    async fn reload(&self) -> WalletResult<NetworkMap<Vec<WalletAccount>>> {
        let persisted = self.storage.get(ACCOUNTS_KEY).await?;
        let accounts = NetworkMap::restore(persisted, &self.networks);
        *self.accounts.write() = accounts.clone();
        Ok(accounts)
    }

    pub async fn add_account(
        &self,
        network_identifier: &str,
        index: u32,
        name: &str,
    ) -> WalletResult<WalletAccount> {
        let mut account = self
            .device
            .get_account(network_identifier, index)
            .await?
            .with_name(name);
        account.account_type = AccountType::Hardware;
        account.index = Some(index);

        let mut accounts = self.reload().await?;
        let list = accounts.entry(network_identifier);
        if position_of(list, &account.public_key).is_some() {
            return Err(WalletError::keystore(
                KeystoreErrorCode::AccountAlreadyExists,
                format!("Hardware account {} is already paired", account.address),
            ));
        }
        list.push(account.clone());

        self.storage.set(ACCOUNTS_KEY, &accounts).await?;
        self.reload().await?;
        Ok(account)
    }

    pub async fn remove_account(&self, account: &WalletAccount) -> WalletResult<()> {
        let mut accounts = self.reload().await?;
        let list = accounts.entry(&account.network_identifier);
        if let Some(position) = position_of(list, &account.public_key) {
            list.remove(position);
        }
        self.storage.set(ACCOUNTS_KEY, &accounts).await?;
        self.reload().await?;
        Ok(())
    }

    fn ensure_paired(&self, account: &WalletAccount) -> WalletResult<()> {
        let paired = self
            .accounts
            .read()
            .get(&account.network_identifier)
            .map(|list| position_of(list, &account.public_key).is_some())
            .unwrap_or(false);
        if paired {
            Ok(())
        } else {
            Err(WalletError::keystore(
                KeystoreErrorCode::AccountMissing,
                format!("Hardware account {} is not paired", account.address),
            ))
        }
    }
}

fn unsupported(operation: &str) -> WalletError {
    WalletError::keystore(
        KeystoreErrorCode::OperationUnsupported,
        format!("Hardware keystore does not support {}", operation),
    )
}

#[async_trait]
impl Keystore for HardwareKeystore {
    fn account_type(&self) -> AccountType {
        AccountType::Hardware
    }

    async fn load_cache(&self, _password: Option<&SecretString>) -> WalletResult<()> {
        self.reload().await?;
        Ok(())
    }

    async fn clear(&self) -> WalletResult<()> {
        self.storage.remove(ACCOUNTS_KEY).await?;
        *self.accounts.write() = NetworkMap::with_defaults(&self.networks);
        Ok(())
    }

    fn get_accounts(&self) -> NetworkMap<Vec<WalletAccount>> {
        self.accounts.read().clone()
    }

    async fn get_private_key(&self, _account: &WalletAccount) -> WalletResult<Zeroizing<String>> {
        Err(unsupported("private key export"))
    }

    async fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &WalletAccount,
    ) -> WalletResult<SignedTransaction> {
        self.ensure_paired(account)?;
        self.device
            .sign_transaction(properties, transaction, account)
            .await
    }

    async fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &WalletAccount,
    ) -> WalletResult<Cosignature> {
        self.ensure_paired(account)?;
        self.device
            .cosign_transaction(properties, transaction, account)
            .await
    }

    async fn encrypt_message(
        &self,
        _message: &str,
        _recipient_public_key: &str,
        _account: &WalletAccount,
    ) -> WalletResult<String> {
        Err(unsupported("message encryption"))
    }

    async fn decrypt_message(
        &self,
        _encrypted_message: &str,
        _sender_public_key: &str,
        _account: &WalletAccount,
    ) -> WalletResult<String> {
        Err(unsupported("message decryption"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{Ed25519Sdk, SigningSdk};
    use crate::storage::{KdfParameters, MemoryStorage, SecureStorageRepository};

    /// Device simulated with a software key per index.
    struct SoftDevice {
        sdk: Ed25519Sdk,
    }

    impl SoftDevice {
        fn key(index: u32) -> String {
            format!("{:064x}", index + 1)
        }
    }

    #[async_trait]
    impl HardwareDevice for SoftDevice {
        async fn get_account(&self, network: &str, index: u32) -> WalletResult<WalletAccount> {
            let private = self.sdk.create_private_account(
                &Self::key(index),
                "",
                network,
                AccountType::Hardware,
                Some(index),
            )?;
            Ok(private.to_public())
        }

        async fn sign_transaction(
            &self,
            properties: &NetworkProperties,
            transaction: &Transaction,
            account: &WalletAccount,
        ) -> WalletResult<SignedTransaction> {
            let index = account.index.unwrap_or(0);
            let private = self.sdk.create_private_account(
                &Self::key(index),
                &account.name,
                &account.network_identifier,
                AccountType::Hardware,
                account.index,
            )?;
            self.sdk.sign_transaction(properties, transaction, &private)
        }

        async fn cosign_transaction(
            &self,
            _properties: &NetworkProperties,
            _transaction: &TransactionRecord,
            _account: &WalletAccount,
        ) -> WalletResult<Cosignature> {
            Err(unsupported("cosigning on this device"))
        }
    }

    fn keystore(persistent: Arc<MemoryStorage>) -> HardwareKeystore {
        let ctx = KeystoreContext {
            secure_storage: SecureStorageRepository::new(
                Arc::new(MemoryStorage::new()),
                KdfParameters::minimal(),
            ),
            persistent_storage: StorageRepository::new(persistent),
            sdk: Arc::new(Ed25519Sdk::new()),
            networks: vec!["testnet".into()],
        };
        HardwareKeystore::new(&ctx, Arc::new(SoftDevice { sdk: Ed25519Sdk::new() }))
    }

    #[tokio::test]
    async fn paired_accounts_persist_without_keys_and_sign_on_device() {
        let persistent = Arc::new(MemoryStorage::new());
        let keystore = keystore(persistent.clone());
        let account = keystore.add_account("testnet", 0, "Ledger").await.unwrap();
        assert_eq!(account.name, "Ledger");
        assert_eq!(persistent.keys(), vec!["keystore.hardware.accounts".to_string()]);

        let props = NetworkProperties {
            node_url: "http://localhost".into(),
            network_identifier: "testnet".into(),
            chain_height: None,
            details: serde_json::Value::Null,
        };
        let signed = keystore
            .sign_transaction(&props, &serde_json::json!({"amount": 5}), &account)
            .await
            .unwrap();
        assert_eq!(signed.signer_public_key, account.public_key);

        let err = keystore.get_private_key(&account).await.unwrap_err();
        assert!(err.is_keystore(KeystoreErrorCode::OperationUnsupported));
        let err = keystore
            .encrypt_message("hi", &account.public_key, &account)
            .await
            .unwrap_err();
        assert!(err.is_keystore(KeystoreErrorCode::OperationUnsupported));

        let restored = self::keystore(persistent);
        restored.load_cache(None).await.unwrap();
        assert_eq!(restored.get_accounts(), keystore.get_accounts());
    }
}
