use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Origin category of an account's key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Mnemonic,
    External,
    Hardware,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Mnemonic => write!(f, "mnemonic"),
            AccountType::External => write!(f, "external"),
            AccountType::Hardware => write!(f, "hardware"),
        }
    }
}

/// Public view of an account. Never carries a private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub address: String,
    pub public_key: String,
    pub name: String,
    pub network_identifier: String,
    pub account_type: AccountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl WalletAccount {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Account together with its private key. Only keystores hold these.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateAccount {
    #[serde(flatten)]
    pub account: WalletAccount,
    pub private_key: String,
}

impl PrivateAccount {
    pub fn public_key(&self) -> &str {
        &self.account.public_key
    }

    pub fn network_identifier(&self) -> &str {
        &self.account.network_identifier
    }

    /// Public copy with the private key stripped.
    pub fn to_public(&self) -> WalletAccount {
        self.account.clone()
    }
}

impl fmt::Debug for PrivateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateAccount")
            .field("account", &self.account)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl Drop for PrivateAccount {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Index of `public_key` within an account list.
pub fn position_of(accounts: &[WalletAccount], public_key: &str) -> Option<usize> {
    accounts
        .iter()
        .position(|account| account.public_key == public_key)
}
