//! Signing capability consumed by keystores.
//!
//! Keystores own key material; the SDK owns the chain's cryptography. A
//! keystore resolves the private account and hands it to the SDK for the
//! duration of one call.

pub mod ed25519;

use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::account::{AccountType, PrivateAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::WalletResult;

pub use ed25519::Ed25519Sdk;

pub trait SigningSdk: Send + Sync {
    fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &PrivateAccount,
    ) -> WalletResult<SignedTransaction>;

    fn cosign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &PrivateAccount,
    ) -> WalletResult<Cosignature>;

    fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
        account: &PrivateAccount,
    ) -> WalletResult<String>;

    fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
        account: &PrivateAccount,
    ) -> WalletResult<String>;

    /// Build a full account (public key, address) from a raw private key.
    fn create_private_account(
        &self,
        private_key: &str,
        name: &str,
        network_identifier: &str,
        account_type: AccountType,
        index: Option<u32>,
    ) -> WalletResult<PrivateAccount>;

    /// Derive one private key per index for the given network.
    fn create_private_keys_from_mnemonic(
        &self,
        mnemonic: &SecretString,
        indexes: &[u32],
        network_identifier: &str,
    ) -> WalletResult<Vec<Zeroizing<String>>>;
}
