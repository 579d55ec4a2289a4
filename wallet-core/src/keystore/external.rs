use async_trait::async_trait;
use secrecy::SecretString;
use zeroize::Zeroizing;

use super::keyring::SoftwareKeyring;
use super::{Keystore, KeystoreContext};
use crate::account::{position_of, AccountType, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::{KeystoreErrorCode, WalletError, WalletResult};
use crate::network_map::NetworkMap;

/// Keystore for individually imported private keys.
pub struct ExternalAccountKeystore {
    keyring: SoftwareKeyring,
}

impl ExternalAccountKeystore {
    pub const STORAGE_SCOPE: &'static str = "keystore.external";

    pub fn new(ctx: &KeystoreContext) -> Self {
        Self {
            keyring: SoftwareKeyring::new(
                ctx.secure_storage.create_scope(Self::STORAGE_SCOPE),
                ctx.sdk.clone(),
                ctx.networks.clone(),
            ),
        }
    }

    pub async fn add_account(
        &self,
        private_key: &str,
        network_identifier: &str,
        name: &str,
        password: Option<&SecretString>,
    ) -> WalletResult<WalletAccount> {
        let account = self.keyring.sdk().create_private_account(
            private_key,
            name,
            network_identifier,
            AccountType::External,
            None,
        )?;

        let mut accounts = self.keyring.reload(password).await?;
        let list = accounts.entry(network_identifier);
        if list.iter().any(|existing| existing.public_key() == account.public_key()) {
            return Err(WalletError::keystore(
                KeystoreErrorCode::AccountAlreadyExists,
                format!("Account {} is already imported", account.account.address),
            ));
        }
        let public = account.to_public();
        list.push(account);

        self.keyring.persist(&accounts, password).await?;
        self.keyring.reload(password).await?;
        log::info!("Imported external account {} on {}", public.address, network_identifier);
        Ok(public)
    }

    pub async fn remove_account(
        &self,
        account: &WalletAccount,
        password: Option<&SecretString>,
    ) -> WalletResult<()> {
        let mut accounts = self.keyring.reload(password).await?;
        let list = accounts.entry(&account.network_identifier);
        let public_keys: Vec<WalletAccount> = list.iter().map(|a| a.to_public()).collect();
        let Some(position) = position_of(&public_keys, &account.public_key) else {
            return Err(WalletError::keystore(
                KeystoreErrorCode::AccountMissing,
                format!("Account {} is not imported", account.address),
            ));
        };
        list.remove(position);

        self.keyring.persist(&accounts, password).await?;
        self.keyring.reload(password).await?;
        Ok(())
    }
}

#[async_trait]
impl Keystore for ExternalAccountKeystore {
    fn account_type(&self) -> AccountType {
        AccountType::External
    }

    async fn load_cache(&self, password: Option<&SecretString>) -> WalletResult<()> {
        self.keyring.reload(password).await?;
        Ok(())
    }

    async fn clear(&self) -> WalletResult<()> {
        self.keyring.clear().await
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

    fn keystore() -> ExternalAccountKeystore {
        ExternalAccountKeystore::new(&KeystoreContext {
            secure_storage: SecureStorageRepository::new(
                Arc::new(MemoryStorage::new()),
                KdfParameters::minimal(),
            ),
            persistent_storage: StorageRepository::new(Arc::new(MemoryStorage::new())),
            sdk: Arc::new(Ed25519Sdk::new()),
            networks: vec!["testnet".into()],
        })
    }

    #[tokio::test]
    async fn duplicate_import_is_rejected() {
        let keystore = keystore();
        let key = "11".repeat(32);
        let account = keystore
            .add_account(&key, "testnet", "Imported", None)
            .await
            .unwrap();
        assert_eq!(account.account_type, AccountType::External);

        let err = keystore
            .add_account(&key, "testnet", "Again", None)
            .await
            .unwrap_err();
        assert!(err.is_keystore(KeystoreErrorCode::AccountAlreadyExists));
        assert_eq!(keystore.get_accounts().get("testnet").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removed_account_can_no_longer_sign() {
        let keystore = keystore();
        let account = keystore
            .add_account(&"22".repeat(32), "testnet", "Imported", None)
            .await
            .unwrap();
        let props = NetworkProperties {
            node_url: "http://localhost".into(),
            network_identifier: "testnet".into(),
            chain_height: None,
            details: serde_json::Value::Null,
        };
        let tx = serde_json::json!({"amount": 1});
        assert!(keystore.sign_transaction(&props, &tx, &account).await.is_ok());

        keystore.remove_account(&account, None).await.unwrap();
        let err = keystore
            .sign_transaction(&props, &tx, &account)
            .await
            .unwrap_err();
        assert!(err.is_keystore(KeystoreErrorCode::AccountMissing));
    }
}
