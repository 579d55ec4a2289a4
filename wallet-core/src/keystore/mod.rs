//! Signing backends.
//!
//! A keystore owns the key material for one account origin and exposes a
//! uniform contract to the controller: list public accounts, sign, cosign,
//! encrypt and decrypt. Private keys never leave the keystore except through
//! the explicit `get_private_key` call.

pub mod external;
pub mod hardware;
mod keyring;
pub mod mnemonic;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::account::{AccountType, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::WalletResult;
use crate::network_map::NetworkMap;
use crate::sdk::SigningSdk;
use crate::storage::{SecureStorageRepository, StorageRepository};

pub use external::ExternalAccountKeystore;
pub use hardware::{HardwareDevice, HardwareKeystore};
pub use mnemonic::MnemonicKeystore;

#[async_trait]
pub trait Keystore: Send + Sync {
    fn account_type(&self) -> AccountType;

    /// Rebuild in-memory state from storage.
    async fn load_cache(&self, password: Option<&SecretString>) -> WalletResult<()>;

    /// Drop persisted and in-memory state.
    async fn clear(&self) -> WalletResult<()>;

    /// Accounts per network with private keys stripped.
    fn get_accounts(&self) -> NetworkMap<Vec<WalletAccount>>;

    async fn get_private_key(&self, account: &WalletAccount) -> WalletResult<Zeroizing<String>>;

    async fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &WalletAccount,
    ) -> WalletResult<SignedTransaction>;

    async fn sign_transaction_bundle(
        &self,
        properties: &NetworkProperties,
        transactions: &[Transaction],
        account: &WalletAccount,
    ) -> WalletResult<Vec<SignedTransaction>> {
        let mut signed = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            signed.push(self.sign_transaction(properties, transaction, account).await?);
        }
        Ok(signed)
    }

    async fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &WalletAccount,
    ) -> WalletResult<Cosignature>;

    async fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String>;

    async fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String>;
}

/// Collaborators handed to keystore factories. Storage repositories are
/// unscoped; each keystore takes its own `keystore.<kind>` scope.
#[derive(Clone)]
pub struct KeystoreContext {
    pub secure_storage: SecureStorageRepository,
    pub persistent_storage: StorageRepository,
    pub sdk: Arc<dyn SigningSdk>,
    pub networks: Vec<String>,
}

/// A constructed keystore. Built-in variants stay typed so the controller can
/// reach their origin-specific operations.
#[derive(Clone)]
pub enum KeystoreHandle {
    Mnemonic(Arc<MnemonicKeystore>),
    External(Arc<ExternalAccountKeystore>),
    Hardware(Arc<HardwareKeystore>),
    Custom(Arc<dyn Keystore>),
}

impl KeystoreHandle {
    pub fn keystore(&self) -> &dyn Keystore {
        match self {
            KeystoreHandle::Mnemonic(keystore) => keystore.as_ref(),
            KeystoreHandle::External(keystore) => keystore.as_ref(),
            KeystoreHandle::Hardware(keystore) => keystore.as_ref(),
            KeystoreHandle::Custom(keystore) => keystore.as_ref(),
        }
    }

    pub fn account_type(&self) -> AccountType {
        self.keystore().account_type()
    }
}

impl std::fmt::Debug for KeystoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeystoreHandle({})", self.account_type())
    }
}

pub type KeystoreFactory = Box<dyn FnOnce(&KeystoreContext) -> KeystoreHandle + Send>;

/// Factories for the mnemonic and external keystores.
pub fn default_keystore_factories() -> Vec<KeystoreFactory> {
    vec![
        Box::new(|ctx: &KeystoreContext| {
            KeystoreHandle::Mnemonic(Arc::new(MnemonicKeystore::new(ctx)))
        }),
        Box::new(|ctx: &KeystoreContext| {
            KeystoreHandle::External(Arc::new(ExternalAccountKeystore::new(ctx)))
        }),
    ]
}
