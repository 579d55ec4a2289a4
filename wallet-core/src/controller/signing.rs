use zeroize::Zeroizing;

use super::{keystore_missing, WalletController};
use crate::account::WalletAccount;
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
    TransactionStatus,
};
use crate::errors::{ControllerErrorCode, WalletError, WalletResult};
use crate::keystore::Keystore;

impl WalletController {
    pub async fn sign_transaction(
        &self,
        transaction: &Transaction,
    ) -> WalletResult<SignedTransaction> {
        let account = self.require_current_account()?;
        let keystore = self.keystore_for(&account)?;
        let properties = self.require_network_properties()?;
        keystore
            .sign_transaction(&properties, transaction, &account)
            .await
    }

    pub async fn sign_transaction_bundle(
        &self,
        transactions: &[Transaction],
    ) -> WalletResult<Vec<SignedTransaction>> {
        let account = self.require_current_account()?;
        let keystore = self.keystore_for(&account)?;
        let properties = self.require_network_properties()?;
        keystore
            .sign_transaction_bundle(&properties, transactions, &account)
            .await
    }

    pub async fn cosign_transaction(
        &self,
        transaction: &TransactionRecord,
    ) -> WalletResult<Cosignature> {
        let account = self.require_current_account()?;
        let keystore = self.keystore_for(&account)?;
        let properties = self.require_network_properties()?;
        keystore
            .cosign_transaction(&properties, transaction, &account)
            .await
    }

    pub async fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
    ) -> WalletResult<String> {
        let account = self.require_current_account()?;
        self.keystore_for(&account)?
            .encrypt_message(message, recipient_public_key, &account)
            .await
    }

    pub async fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
    ) -> WalletResult<String> {
        let account = self.require_current_account()?;
        self.keystore_for(&account)?
            .decrypt_message(encrypted_message, sender_public_key, &account)
            .await
    }

    /// Export the active account's key.
    pub async fn get_current_account_private_key(&self) -> WalletResult<Zeroizing<String>> {
        let account = self.require_current_account()?;
        self.keystore_for(&account)?.get_private_key(&account).await
    }

    pub async fn announce_signed_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> WalletResult<()> {
        let properties = self.require_network_properties()?;
        self.network_api
            .transaction
            .announce_transaction(&properties, transaction)
            .await?;
        log::info!("Announced transaction {}", transaction.hash);
        Ok(())
    }

    pub async fn announce_signed_transaction_bundle(
        &self,
        transactions: &[SignedTransaction],
    ) -> WalletResult<()> {
        let properties = self.require_network_properties()?;
        self.network_api
            .transaction
            .announce_transaction_bundle(&properties, transactions)
            .await?;
        log::info!("Announced bundle of {} transactions", transactions.len());
        Ok(())
    }

    pub async fn fetch_transaction_status(&self, hash: &str) -> WalletResult<TransactionStatus> {
        let properties = self.require_network_properties()?;
        self.network_api
            .transaction
            .fetch_transaction_status(&properties, hash)
            .await
    }

    fn keystore_for(&self, account: &WalletAccount) -> WalletResult<&dyn Keystore> {
        self.keystores
            .iter()
            .find(|handle| handle.account_type() == account.account_type)
            .map(|handle| handle.keystore())
            .ok_or_else(|| keystore_missing(account.account_type))
    }

    pub(super) fn require_network_properties(&self) -> WalletResult<NetworkProperties> {
        self.state.read().network_properties.clone().ok_or_else(|| {
            WalletError::controller(
                ControllerErrorCode::NetworkPropertiesMissing,
                "Not connected to a node of the active network",
            )
        })
    }
}
