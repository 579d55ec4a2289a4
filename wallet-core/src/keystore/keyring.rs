use std::sync::Arc;

use parking_lot::RwLock;
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::account::{PrivateAccount, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::{KeystoreErrorCode, WalletError, WalletResult};
use crate::network_map::NetworkMap;
use crate::sdk::SigningSdk;
use crate::storage::SecureStorageRepository;

const ACCOUNTS_KEY: &str = "accounts";

/// Private accounts held in secure storage plus their in-memory cache.
/// Shared by every keystore whose keys live in software.
pub(crate) struct SoftwareKeyring {
    storage: SecureStorageRepository,
    sdk: Arc<dyn SigningSdk>,
    networks: Vec<String>,
    accounts: RwLock<NetworkMap<Vec<PrivateAccount>>>,
}

impl SoftwareKeyring {
    pub(crate) fn new(
        storage: SecureStorageRepository,
        sdk: Arc<dyn SigningSdk>,
        networks: Vec<String>,
    ) -> Self {
        let accounts = NetworkMap::with_defaults(&networks);
        Self {
            storage,
            sdk,
            networks,
            accounts: RwLock::new(accounts),
        }
    }

    pub(crate) fn storage(&self) -> &SecureStorageRepository {
        &self.storage
    }

    pub(crate) fn sdk(&self) -> &Arc<dyn SigningSdk> {
        &self.sdk
    }

    pub(crate) fn networks(&self) -> &[String] {
        &self.networks
    }

    /// Read the persisted accounts and replace the cache with them.
    pub(crate) async fn reload(
        &self,
        password: Option<&SecretString>,
    ) -> WalletResult<NetworkMap<Vec<PrivateAccount>>> {
        let persisted = self.storage.get(ACCOUNTS_KEY, password).await?;
        let accounts = NetworkMap::restore(persisted, &self.networks);
        *self.accounts.write() = accounts.clone();
        Ok(accounts)
    }

    pub(crate) async fn persist(
        &self,
        accounts: &NetworkMap<Vec<PrivateAccount>>,
        password: Option<&SecretString>,
    ) -> WalletResult<()> {
        self.storage.set(ACCOUNTS_KEY, accounts, password).await
    }

    pub(crate) async fn clear(&self) -> WalletResult<()> {
        self.storage.remove(ACCOUNTS_KEY).await?;
        *self.accounts.write() = NetworkMap::with_defaults(&self.networks);
        Ok(())
    }

    pub(crate) fn public_accounts(&self) -> NetworkMap<Vec<WalletAccount>> {
        self.accounts
            .read()
            .map(|_, accounts| accounts.iter().map(PrivateAccount::to_public).collect())
    }

    pub(crate) fn find(&self, account: &WalletAccount) -> WalletResult<PrivateAccount> {
        self.accounts
            .read()
            .get(&account.network_identifier)
            .and_then(|accounts| {
                accounts
                    .iter()
                    .find(|candidate| candidate.public_key() == account.public_key)
            })
            .cloned()
            .ok_or_else(|| {
                WalletError::keystore(
                    KeystoreErrorCode::AccountMissing,
                    format!(
                        "No key for account {} on {}",
                        account.address, account.network_identifier
                    ),
                )
            })
    }

    pub(crate) fn private_key(&self, account: &WalletAccount) -> WalletResult<Zeroizing<String>> {
        let private = self.find(account)?;
        Ok(Zeroizing::new(private.private_key.clone()))
    }

    pub(crate) fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &WalletAccount,
    ) -> WalletResult<SignedTransaction> {
        let private = self.find(account)?;
        self.sdk.sign_transaction(properties, transaction, &private)
    }

    pub(crate) fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &WalletAccount,
    ) -> WalletResult<Cosignature> {
        let private = self.find(account)?;
        self.sdk.cosign_transaction(properties, transaction, &private)
    }

    pub(crate) fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String> {
        let private = self.find(account)?;
        self.sdk
            .encrypt_message(message, recipient_public_key, &private)
    }

    pub(crate) fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String> {
        let private = self.find(account)?;
        self.sdk
            .decrypt_message(encrypted_message, sender_public_key, &private)
    }
}
