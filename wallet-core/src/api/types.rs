use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chain-reported account data. Opaque to the wallet core.
pub type AccountInfo = serde_json::Value;

/// Unsigned, chain-specific transaction body. Opaque to the wallet core.
pub type Transaction = serde_json::Value;

/// Properties of the network a node serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProperties {
    pub node_url: String,
    pub network_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_height: Option<u64>,
    /// Chain-specific fields (generation hash, epoch adjustment, fees...).
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkConnectionStatus {
    Initial,
    Connecting,
    Connected,
    NoInternet,
    FailedCustomNode,
}

impl Default for NetworkConnectionStatus {
    fn default() -> Self {
        NetworkConnectionStatus::Initial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionGroup {
    Confirmed,
    Unconfirmed,
    Partial,
}

/// A transaction as reported by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    pub group: TransactionGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Query shape accepted by the transaction history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub group: TransactionGroup,
    #[serde(default)]
    pub filter: BTreeMap<String, String>,
    pub page_number: u32,
    pub page_size: u32,
}

impl TransactionQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 15;

    /// First page of confirmed transactions with no filter.
    ///
    /// Page size does not take part in the comparison: any first unfiltered
    /// confirmed page refreshes the cache.
    pub fn is_default(&self) -> bool {
        self.group == TransactionGroup::Confirmed && self.page_number == 1 && self.filter.is_empty()
    }

    pub fn with_group(mut self, group: TransactionGroup) -> Self {
        self.group = group;
        self
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            group: TransactionGroup::Confirmed,
            filter: BTreeMap::new(),
            page_number: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub hash: String,
    /// Hex-encoded signed payload, ready to announce.
    pub payload: String,
    pub signer_public_key: String,
    pub signature: String,
    pub network_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cosignature {
    pub parent_hash: String,
    pub signer_public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub hash: String,
    pub group: Option<TransactionGroup>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionErrorInfo {
    pub hash: String,
    pub code: String,
}

/// Subscription channels a chain listener exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerChannel {
    Confirmed,
    UnconfirmedAdded,
    UnconfirmedRemoved,
    PartialAdded,
    PartialRemoved,
    Error,
}

impl ListenerChannel {
    pub const ALL: [ListenerChannel; 6] = [
        ListenerChannel::Confirmed,
        ListenerChannel::UnconfirmedAdded,
        ListenerChannel::UnconfirmedRemoved,
        ListenerChannel::PartialAdded,
        ListenerChannel::PartialRemoved,
        ListenerChannel::Error,
    ];
}

/// Event delivered by a live chain subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    TransactionAdded(TransactionRecord),
    TransactionRemoved {
        group: TransactionGroup,
        hash: String,
    },
    TransactionError(TransactionErrorInfo),
}
