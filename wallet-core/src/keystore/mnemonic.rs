use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use super::keyring::SoftwareKeyring;
use super::{Keystore, KeystoreContext};
use crate::account::{AccountType, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::{KeystoreErrorCode, WalletError, WalletResult};
use crate::network_map::NetworkMap;
use crate::validation::InputValidator;

const MNEMONIC_KEY: &str = "mnemonic";

/// Keystore for accounts derived from one seed phrase.
pub struct MnemonicKeystore {
    keyring: SoftwareKeyring,
    mnemonic_loaded: RwLock<bool>,
}

impl MnemonicKeystore {
    pub const STORAGE_SCOPE: &'static str = "keystore.mnemonic";

    pub fn new(ctx: &KeystoreContext) -> Self {
        Self {
            keyring: SoftwareKeyring::new(
                ctx.secure_storage.create_scope(Self::STORAGE_SCOPE),
                ctx.sdk.clone(),
                ctx.networks.clone(),
            ),
            mnemonic_loaded: RwLock::new(false),
        }
    }

    pub fn seed_account_name(index: u32) -> String {
        format!("Seed account {}", index + 1)
    }

    /// Store the mnemonic and derive `count` accounts (indexes `0..count`)
    /// on every configured network. Replaces any previous wallet.
    pub async fn create_wallet(
        &self,
        mnemonic: &SecretString,
        count: u32,
        password: Option<&SecretString>,
    ) -> WalletResult<NetworkMap<Vec<WalletAccount>>> {
        InputValidator::validate_mnemonic_word_count(mnemonic.expose_secret())?;
        InputValidator::validate_account_count(count)?;

        let indexes: Vec<u32> = (0..count).collect();
        let mut accounts = self.keyring.reload(password).await?;
        for network in self.keyring.networks() {
            let keys = self
                .keyring
                .sdk()
                .create_private_keys_from_mnemonic(mnemonic, &indexes, network)?;

            let mut derived = Vec::with_capacity(keys.len());
            for (index, key) in indexes.iter().zip(keys.iter()) {
                derived.push(self.keyring.sdk().create_private_account(
                    key,
                    &Self::seed_account_name(*index),
                    network,
                    AccountType::Mnemonic,
                    Some(*index),
                )?);
            }
            accounts.insert(network.clone(), derived);
        }

        self.keyring
            .storage()
            .set(MNEMONIC_KEY, mnemonic.expose_secret(), password)
            .await?;
        self.keyring.persist(&accounts, password).await?;
        self.keyring.reload(password).await?;
        *self.mnemonic_loaded.write() = true;
        log::info!(
            "Created mnemonic wallet with {} accounts per network",
            count
        );

        Ok(self.keyring.public_accounts())
    }

    /// Derived account at `index` on a network.
    pub fn get_seed_account(
        &self,
        network_identifier: &str,
        index: u32,
    ) -> WalletResult<WalletAccount> {
        self.keyring
            .public_accounts()
            .get(network_identifier)
            .and_then(|accounts| accounts.iter().find(|a| a.index == Some(index)).cloned())
            .ok_or_else(|| {
                WalletError::keystore(
                    KeystoreErrorCode::AccountMissing,
                    format!("No seed account {} on {}", index, network_identifier),
                )
            })
    }

    pub async fn get_mnemonic(&self, password: Option<&SecretString>) -> WalletResult<SecretString> {
        let mnemonic: Option<Zeroizing<String>> = self
            .keyring
            .storage()
            .get::<String>(MNEMONIC_KEY, password)
            .await?
            .map(Zeroizing::new);
        match mnemonic {
            Some(words) => Ok(SecretString::from(words.as_str())),
            None => Err(WalletError::keystore(
                KeystoreErrorCode::MnemonicMissing,
                "No mnemonic has been stored",
            )),
        }
    }

    pub fn has_mnemonic(&self) -> bool {
        *self.mnemonic_loaded.read()
    }
}

#[async_trait]
impl Keystore for MnemonicKeystore {
    fn account_type(&self) -> AccountType {
        AccountType::Mnemonic
    }

    async fn load_cache(&self, password: Option<&SecretString>) -> WalletResult<()> {
        self.keyring.reload(password).await?;
        let stored: Option<String> = self.keyring.storage().get(MNEMONIC_KEY, password).await?;
        let stored = stored.map(Zeroizing::new);
        *self.mnemonic_loaded.write() = stored.is_some();
        Ok(())
    }

    async fn clear(&self) -> WalletResult<()> {
        self.keyring.storage().remove(MNEMONIC_KEY).await?;
        self.keyring.clear().await?;
        *self.mnemonic_loaded.write() = false;
        Ok(())
    }

    fn get_accounts(&self) -> NetworkMap<Vec<WalletAccount>> {
        self.keyring.public_accounts()
    }

    async fn get_private_key(&self, account: &WalletAccount) -> WalletResult<Zeroizing<String>> {
        self.keyring.private_key(account)
    }

    async fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &WalletAccount,
    ) -> WalletResult<SignedTransaction> {
        self.keyring.sign_transaction(properties, transaction, account)
    }

    async fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &WalletAccount,
    ) -> WalletResult<Cosignature> {
        self.keyring.cosign_transaction(properties, transaction, account)
    }

    async fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String> {
        self.keyring
            .encrypt_message(message, recipient_public_key, account)
    }

    async fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
        account: &WalletAccount,
    ) -> WalletResult<String> {
        self.keyring
            .decrypt_message(encrypted_message, sender_public_key, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::Ed25519Sdk;
    use crate::storage::{KdfParameters, MemoryStorage, SecureStorageRepository, StorageRepository};
    use std::sync::Arc;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn context(backend: &Arc<MemoryStorage>) -> KeystoreContext {
        KeystoreContext {
            secure_storage: SecureStorageRepository::new(backend.clone(), KdfParameters::minimal()),
            persistent_storage: StorageRepository::new(Arc::new(MemoryStorage::new())),
            sdk: Arc::new(Ed25519Sdk::new()),
            networks: vec!["mainnet".into(), "testnet".into()],
        }
    }

    #[tokio::test]
    async fn create_wallet_derives_accounts_per_network() {
        let backend = Arc::new(MemoryStorage::new());
        let keystore = MnemonicKeystore::new(&context(&backend));
        let accounts = keystore
            .create_wallet(&SecretString::from(MNEMONIC), 3, None)
            .await
            .unwrap();

        assert_eq!(accounts.get("mainnet").unwrap().len(), 3);
        assert_eq!(accounts.get("testnet").unwrap().len(), 3);
        assert!(keystore.has_mnemonic());

        let second = keystore.get_seed_account("testnet", 1).unwrap();
        assert_eq!(second.index, Some(1));
        assert!(keystore
            .get_seed_account("testnet", 7)
            .unwrap_err()
            .is_keystore(KeystoreErrorCode::AccountMissing));

        // Deterministic across instances sharing storage.
        let reloaded = MnemonicKeystore::new(&context(&backend));
        reloaded.load_cache(None).await.unwrap();
        assert_eq!(reloaded.get_accounts(), keystore.get_accounts());
        assert!(reloaded.get_private_key(&second).await.is_ok());
    }

    #[tokio::test]
    async fn mnemonic_requires_password_when_sealed() {
        let backend = Arc::new(MemoryStorage::new());
        let keystore = MnemonicKeystore::new(&context(&backend));
        let password = SecretString::from("correct horse");
        keystore
            .create_wallet(&SecretString::from(MNEMONIC), 1, Some(&password))
            .await
            .unwrap();

        let words = keystore.get_mnemonic(Some(&password)).await.unwrap();
        assert_eq!(words.expose_secret(), MNEMONIC);
        assert!(keystore.get_mnemonic(None).await.is_err());

        keystore.clear().await.unwrap();
        assert!(keystore
            .get_mnemonic(Some(&password))
            .await
            .unwrap_err()
            .is_keystore(KeystoreErrorCode::MnemonicMissing));
        assert!(backend.is_empty());
    }
}
