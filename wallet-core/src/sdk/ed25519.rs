//! Reference Ed25519 signing SDK
//!
//! BIP-39 seeds, SLIP-0010 hardened derivation along
//! `m/44'/{coin}'/{index}'/0'/0'`, SHA3-256 transaction hashes and
//! X25519 + AES-256-GCM message encryption derived from the same keys.

use std::collections::HashMap;

use bip39::{Language, Mnemonic};
use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::Nonce;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest as _, Sha256, Sha512};
use sha3::Sha3_256;
use zeroize::Zeroizing;

use super::SigningSdk;
use crate::account::{AccountType, PrivateAccount, WalletAccount};
use crate::api::types::{
    Cosignature, NetworkProperties, SignedTransaction, Transaction, TransactionRecord,
};
use crate::errors::{WalletError, WalletResult};
use crate::storage::secure::{decrypt_aes_gcm, encrypt_aes_gcm};

const HARDENED_OFFSET: u32 = 0x8000_0000;
const SLIP10_CURVE: &[u8] = b"ed25519 seed";
const PURPOSE: u32 = 44;
const DEFAULT_COIN_TYPE: u32 = 1;
const NONCE_LEN: usize = 12;
const ADDRESS_LEN: usize = 20;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Default)]
pub struct Ed25519Sdk {
    coin_types: HashMap<String, u32>,
}

impl Ed25519Sdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// SLIP-0044 coin type used for a network. Unlisted networks use 1.
    pub fn with_coin_type(mut self, network_identifier: impl Into<String>, coin_type: u32) -> Self {
        self.coin_types.insert(network_identifier.into(), coin_type);
        self
    }

    fn coin_type(&self, network_identifier: &str) -> u32 {
        self.coin_types
            .get(network_identifier)
            .copied()
            .unwrap_or(DEFAULT_COIN_TYPE)
    }

    pub fn derivation_path(&self, network_identifier: &str, index: u32) -> [u32; 5] {
        [PURPOSE, self.coin_type(network_identifier), index, 0, 0]
    }

    /// Address: upper-case hex of the first 20 bytes of SHA3-256(public key).
    pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
        let digest = Sha3_256::digest(public_key);
        hex::encode_upper(&digest[..ADDRESS_LEN])
    }

    pub fn verify(public_key: &str, message: &[u8], signature: &str) -> WalletResult<bool> {
        let verifying_key = parse_public_key(public_key)?;
        let bytes = hex::decode(signature)
            .map_err(|e| WalletError::CryptoError(format!("Invalid signature hex: {}", e)))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| WalletError::CryptoError(format!("Invalid signature: {}", e)))?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

/// Generate a fresh BIP-39 English mnemonic.
pub fn generate_mnemonic(word_count: u32) -> WalletResult<SecretString> {
    let entropy_bits = match word_count {
        12 => 128,
        15 => 160,
        18 => 192,
        21 => 224,
        24 => 256,
        _ => {
            return Err(WalletError::ValidationError(
                "Invalid word count".to_string(),
            ))
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bits / 8]);
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to generate entropy: {}", e)))?;

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to create mnemonic: {}", e)))?;
    Ok(SecretString::from(mnemonic.to_string()))
}

fn seed_from_mnemonic(mnemonic: &SecretString) -> WalletResult<Zeroizing<[u8; 64]>> {
    let parsed = Mnemonic::parse_in_normalized(Language::English, mnemonic.expose_secret())
        .map_err(|e| WalletError::ValidationError(format!("Invalid mnemonic: {}", e)))?;
    Ok(Zeroizing::new(parsed.to_seed_normalized("")))
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::CryptoError(format!("HMAC error: {}", e)))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// SLIP-0010 Ed25519 derivation. Every segment is hardened.
fn derive_slip10(seed: &[u8], path: &[u32]) -> WalletResult<Zeroizing<[u8; 32]>> {
    let master = hmac_sha512(SLIP10_CURVE, seed)?;
    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&master[..32]);
    chain_code.copy_from_slice(&master[32..]);

    for segment in path {
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        data.push(0u8);
        data.extend_from_slice(key.as_ref());
        data.extend_from_slice(&(segment | HARDENED_OFFSET).to_be_bytes());

        let child = hmac_sha512(chain_code.as_ref(), &data)?;
        key.copy_from_slice(&child[..32]);
        chain_code.copy_from_slice(&child[32..]);
    }
    Ok(key)
}

fn parse_private_key(private_key: &str) -> WalletResult<SigningKey> {
    let bytes = Zeroizing::new(
        hex::decode(private_key.trim())
            .map_err(|e| WalletError::CryptoError(format!("Invalid private key hex: {}", e)))?,
    );
    let secret: Zeroizing<[u8; 32]> = Zeroizing::new(
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::CryptoError("Private key must be 32 bytes".to_string()))?,
    );
    Ok(SigningKey::from_bytes(&secret))
}

fn parse_public_key(public_key: &str) -> WalletResult<VerifyingKey> {
    let bytes = hex::decode(public_key.trim())
        .map_err(|e| WalletError::CryptoError(format!("Invalid public key hex: {}", e)))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| WalletError::CryptoError("Public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| WalletError::CryptoError(format!("Invalid public key: {}", e)))
}

/// AES key from the X25519 shared secret of our key and their public key.
fn shared_key(account: &PrivateAccount, other_public_key: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
    let signing_key = parse_private_key(&account.private_key)?;
    let scalar = Zeroizing::new(signing_key.to_scalar_bytes());
    let other: MontgomeryPoint = parse_public_key(other_public_key)?.to_montgomery();
    let shared = Zeroizing::new(other.mul_clamped(*scalar).to_bytes());

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(shared.as_ref()));
    Ok(key)
}

impl SigningSdk for Ed25519Sdk {
    fn sign_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &Transaction,
        account: &PrivateAccount,
    ) -> WalletResult<SignedTransaction> {
        if account.network_identifier() != properties.network_identifier {
            return Err(WalletError::CryptoError(format!(
                "Account belongs to '{}', cannot sign for '{}'",
                account.network_identifier(),
                properties.network_identifier
            )));
        }

        let signing_key = parse_private_key(&account.private_key)?;
        let body = serde_json::to_vec(transaction)?;
        let hash = Sha3_256::digest(&body);

        // Network identifier is a domain separator so a signature cannot be
        // replayed on another network.
        let mut message = properties.network_identifier.as_bytes().to_vec();
        message.extend_from_slice(&hash);
        let signature = signing_key.sign(&message);

        let mut payload = signature.to_bytes().to_vec();
        payload.extend_from_slice(signing_key.verifying_key().as_bytes());
        payload.extend_from_slice(&body);

        Ok(SignedTransaction {
            hash: hex::encode_upper(hash),
            payload: hex::encode_upper(payload),
            signer_public_key: account.public_key().to_string(),
            signature: hex::encode_upper(signature.to_bytes()),
            network_identifier: properties.network_identifier.clone(),
        })
    }

    fn cosign_transaction(
        &self,
        _properties: &NetworkProperties,
        transaction: &TransactionRecord,
        account: &PrivateAccount,
    ) -> WalletResult<Cosignature> {
        let signing_key = parse_private_key(&account.private_key)?;
        let parent = hex::decode(&transaction.hash)
            .map_err(|e| WalletError::CryptoError(format!("Invalid transaction hash: {}", e)))?;
        let signature = signing_key.sign(&parent);

        Ok(Cosignature {
            parent_hash: transaction.hash.clone(),
            signer_public_key: account.public_key().to_string(),
            signature: hex::encode_upper(signature.to_bytes()),
        })
    }

    fn encrypt_message(
        &self,
        message: &str,
        recipient_public_key: &str,
        account: &PrivateAccount,
    ) -> WalletResult<String> {
        let key = shared_key(account, recipient_public_key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let mut buffer = Zeroizing::new(message.as_bytes().to_vec());
        let ciphertext =
            encrypt_aes_gcm(&key, Nonce::assume_unique_for_key(nonce_bytes), &mut buffer)?;

        let mut out = nonce_bytes.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode_upper(out))
    }

    fn decrypt_message(
        &self,
        encrypted_message: &str,
        sender_public_key: &str,
        account: &PrivateAccount,
    ) -> WalletResult<String> {
        let bytes = hex::decode(encrypted_message)
            .map_err(|e| WalletError::CryptoError(format!("Invalid message hex: {}", e)))?;
        if bytes.len() < NONCE_LEN {
            return Err(WalletError::CryptoError("Message too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        let key = shared_key(account, sender_public_key)?;
        let plaintext = decrypt_aes_gcm(&key, Nonce::assume_unique_for_key(nonce), ciphertext)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|e| WalletError::CryptoError(format!("Message is not UTF-8: {}", e)))
    }

    fn create_private_account(
        &self,
        private_key: &str,
        name: &str,
        network_identifier: &str,
        account_type: AccountType,
        index: Option<u32>,
    ) -> WalletResult<PrivateAccount> {
        let signing_key = parse_private_key(private_key)?;
        let public_key = signing_key.verifying_key().to_bytes();

        Ok(PrivateAccount {
            account: WalletAccount {
                address: Self::address_from_public_key(&public_key),
                public_key: hex::encode_upper(public_key),
                name: name.to_string(),
                network_identifier: network_identifier.to_string(),
                account_type,
                index,
            },
            private_key: hex::encode_upper(signing_key.to_bytes()),
        })
    }

    fn create_private_keys_from_mnemonic(
        &self,
        mnemonic: &SecretString,
        indexes: &[u32],
        network_identifier: &str,
    ) -> WalletResult<Vec<Zeroizing<String>>> {
        let seed = seed_from_mnemonic(mnemonic)?;
        indexes
            .iter()
            .map(|index| {
                let path = self.derivation_path(network_identifier, *index);
                let key = derive_slip10(seed.as_ref(), &path)?;
                Ok(Zeroizing::new(hex::encode_upper(key.as_ref())))
            })
            .collect()
    }
}
