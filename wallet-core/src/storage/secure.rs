use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use blake3::Hasher as Blake3;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::interface::StorageInterface;
use crate::errors::{WalletError, WalletResult};

const SEAL_MAGIC: &[u8; 8] = b"WLTSEAL1";
const SEAL_VERSION: u16 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id cost profile used to derive sealing keys from a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParameters {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl KdfParameters {
    /// Hardened profile for production wallets.
    pub const fn strong() -> Self {
        Self {
            m_cost_kib: 256 * 1024, // 256 MiB
            t_cost: 4,
            p_cost: 1,
        }
    }

    /// Profile for interactive desktop/mobile use.
    pub const fn interactive() -> Self {
        Self {
            m_cost_kib: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }

    /// Cheapest parameters Argon2 accepts. Test suites only.
    pub const fn minimal() -> Self {
        Self {
            m_cost_kib: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

impl Default for KdfParameters {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Envelope written for values sealed with a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedValue {
    magic: [u8; 8],
    version: u16,
    kdf: KdfParameters,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    checksum: [u8; 32],
    ciphertext: Vec<u8>,
}

/// Repository for key material.
///
/// The backend is expected to be encrypted at rest already. When a password
/// is supplied values are additionally sealed (Argon2id key, AES-256-GCM,
/// BLAKE3 integrity checksum) before they reach the backend.
#[derive(Clone)]
pub struct SecureStorageRepository {
    storage: Arc<dyn StorageInterface>,
    kdf: KdfParameters,
}

impl SecureStorageRepository {
    pub fn new(storage: Arc<dyn StorageInterface>, kdf: KdfParameters) -> Self {
        Self { storage, kdf }
    }

    pub fn create_scope(&self, prefix: &str) -> Self {
        Self {
            storage: self.storage.clone().create_scope(prefix),
            kdf: self.kdf,
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        password: Option<&SecretString>,
    ) -> WalletResult<Option<T>> {
        let Some(raw) = self.storage.get_item(key).await? else {
            return Ok(None);
        };
        let raw = Zeroizing::new(raw);

        let plaintext = match serde_json::from_str::<SealedValue>(&raw) {
            Ok(sealed) => {
                let password = password.ok_or_else(|| {
                    WalletError::CryptoError(format!("Value '{}' is sealed; password required", key))
                })?;
                open_sealed(password, &sealed)?
            }
            Err(_) => Zeroizing::new(raw.as_bytes().to_vec()),
        };

        match serde_json::from_slice(&plaintext) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Discarding undecodable secure value for '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        password: Option<&SecretString>,
    ) -> WalletResult<()> {
        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
        let encoded = match password {
            Some(password) => {
                let sealed = seal(password, self.kdf, &plaintext)?;
                serde_json::to_string(&sealed)?
            }
            None => String::from_utf8(plaintext.to_vec())
                .map_err(|e| WalletError::SerializationError(e.to_string()))?,
        };
        let encoded = Zeroizing::new(encoded);
        self.storage.set_item(key, &encoded).await
    }

    pub async fn remove(&self, key: &str) -> WalletResult<()> {
        self.storage.remove_item(key).await
    }
}

impl std::fmt::Debug for SecureStorageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorageRepository")
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

fn seal(password: &SecretString, kdf: KdfParameters, plaintext: &[u8]) -> WalletResult<SealedValue> {
    let mut rng = OsRng;
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &kdf, &salt)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);
    let checksum = blake3_checksum(plaintext);

    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let ciphertext = encrypt_aes_gcm(&key, nonce, &mut buffer)?;

    Ok(SealedValue {
        magic: *SEAL_MAGIC,
        version: SEAL_VERSION,
        kdf,
        salt,
        nonce: nonce_bytes,
        checksum,
        ciphertext,
    })
}

fn open_sealed(password: &SecretString, sealed: &SealedValue) -> WalletResult<Zeroizing<Vec<u8>>> {
    if &sealed.magic != SEAL_MAGIC {
        return Err(WalletError::ValidationError(
            "Invalid sealed value marker".to_string(),
        ));
    }

    if sealed.version != SEAL_VERSION {
        return Err(WalletError::ValidationError(format!(
            "Unsupported sealed value version: {}",
            sealed.version
        )));
    }

    let key = derive_key(password, &sealed.kdf, &sealed.salt)?;
    let nonce = Nonce::assume_unique_for_key(sealed.nonce);
    let plaintext = decrypt_aes_gcm(&key, nonce, &sealed.ciphertext)?;
    if blake3_checksum(&plaintext) != sealed.checksum {
        return Err(WalletError::ValidationError(
            "Sealed value integrity verification failed".to_string(),
        ));
    }
    Ok(plaintext)
}

fn derive_key(
    password: &SecretString,
    params: &KdfParameters,
    salt: &[u8; SALT_LEN],
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(
        params.m_cost_kib,
        params.t_cost,
        params.p_cost,
        Some(KEY_LEN),
    )
    .map_err(|e| WalletError::CryptoError(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, key.as_mut())
        .map_err(|e| WalletError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

pub(crate) fn encrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    buffer: &mut Zeroizing<Vec<u8>>,
) -> WalletResult<Vec<u8>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.as_ref())
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    let mut in_out: Vec<u8> = buffer.iter().copied().collect();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Encryption failure".to_string()))?;
    Ok(in_out)
}

pub(crate) fn decrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    ciphertext: &[u8],
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.as_ref())
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    if ciphertext.len() < aead::AES_256_GCM.tag_len() {
        return Err(WalletError::CryptoError(
            "Ciphertext shorter than authentication tag".to_string(),
        ));
    }

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Decryption failure".to_string()))?;
    let plaintext_len = plaintext.len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

fn blake3_checksum(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn secret(password: &str) -> SecretString {
        SecretString::from(password.to_string())
    }

    fn repository(backend: &Arc<MemoryStorage>) -> SecureStorageRepository {
        SecureStorageRepository::new(backend.clone(), KdfParameters::minimal()).create_scope("keystore")
    }

    #[tokio::test]
    async fn sealed_round_trip() {
        let backend = Arc::new(MemoryStorage::new());
        let repo = repository(&backend);
        let mnemonic = "abandon abandon abandon".to_string();

        repo.set("mnemonic", &mnemonic, Some(&secret("hunter2")))
            .await
            .unwrap();
        let stored = backend.snapshot()["keystore.mnemonic"].clone();
        assert!(!stored.contains("abandon"));

        let loaded: Option<String> = repo.get("mnemonic", Some(&secret("hunter2"))).await.unwrap();
        assert_eq!(loaded, Some(mnemonic));
    }

    #[tokio::test]
    async fn wrong_password_is_an_error_not_absence() {
        let backend = Arc::new(MemoryStorage::new());
        let repo = repository(&backend);
        repo.set("mnemonic", "words", Some(&secret("right")))
            .await
            .unwrap();

        let result: WalletResult<Option<String>> = repo.get("mnemonic", Some(&secret("wrong"))).await;
        assert!(matches!(result, Err(WalletError::CryptoError(_))));

        let result: WalletResult<Option<String>> = repo.get("mnemonic", None).await;
        assert!(matches!(result, Err(WalletError::CryptoError(_))));
    }

    #[tokio::test]
    async fn plain_values_without_password() {
        let backend = Arc::new(MemoryStorage::new());
        let repo = repository(&backend);
        repo.set("accounts", &vec![1u8, 2, 3], None).await.unwrap();
        let loaded: Option<Vec<u8>> = repo.get("accounts", None).await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u8>> = repo.get("other", None).await.unwrap();
        assert!(missing.is_none());
    }
}
