use std::collections::BTreeMap;

use crate::account::WalletAccount;
use crate::api::types::{AccountInfo, NetworkProperties, TransactionRecord};
use crate::errors::WalletResult;
use crate::network_map::NetworkMap;
use crate::storage::StorageRepository;

const NETWORK_IDENTIFIER: &str = "networkIdentifier";
const SELECTED_NODE: &str = "selectedNode";
const NETWORK_PROPERTIES: &str = "networkProperties";
const NODE_URLS: &str = "nodeUrls";
const ACCOUNTS: &str = "accounts";
const ACCOUNT_INFOS: &str = "accountInfos";
const SEED_ADDRESSES: &str = "seedAddresses";
const LATEST_TRANSACTIONS: &str = "latestTransactions";
const CURRENT_ACCOUNT_PUBLIC_KEY: &str = "currentAccountPublicKey";

const ALL_KEYS: [&str; 9] = [
    NETWORK_IDENTIFIER,
    SELECTED_NODE,
    NETWORK_PROPERTIES,
    NODE_URLS,
    ACCOUNTS,
    ACCOUNT_INFOS,
    SEED_ADDRESSES,
    LATEST_TRANSACTIONS,
    CURRENT_ACCOUNT_PUBLIC_KEY,
];

pub type AccountInfos = NetworkMap<BTreeMap<String, AccountInfo>>;
pub type LatestTransactions = NetworkMap<BTreeMap<String, Vec<TransactionRecord>>>;

/// Typed slices of the controller's persistent scope.
#[derive(Debug, Clone)]
pub(crate) struct ControllerStorage {
    repository: StorageRepository,
}

impl ControllerStorage {
    pub(crate) const SCOPE: &'static str = "controller";

    pub(crate) fn new(root: &StorageRepository) -> Self {
        Self {
            repository: root.create_scope(Self::SCOPE),
        }
    }

    pub(crate) async fn network_identifier(&self) -> WalletResult<Option<String>> {
        self.repository.get(NETWORK_IDENTIFIER).await
    }

    pub(crate) async fn set_network_identifier(&self, network_identifier: &str) -> WalletResult<()> {
        self.repository.set(NETWORK_IDENTIFIER, network_identifier).await
    }

    pub(crate) async fn selected_node(&self) -> WalletResult<Option<String>> {
        self.repository.get(SELECTED_NODE).await
    }

    pub(crate) async fn set_selected_node(&self, node_url: Option<&String>) -> WalletResult<()> {
        self.repository.set_optional(SELECTED_NODE, node_url).await
    }

    pub(crate) async fn network_properties(&self) -> WalletResult<Option<NetworkProperties>> {
        self.repository.get(NETWORK_PROPERTIES).await
    }

    pub(crate) async fn set_network_properties(
        &self,
        properties: Option<&NetworkProperties>,
    ) -> WalletResult<()> {
        self.repository
            .set_optional(NETWORK_PROPERTIES, properties)
            .await
    }

    pub(crate) async fn node_urls(&self) -> WalletResult<Option<NetworkMap<Vec<String>>>> {
        self.repository.get(NODE_URLS).await
    }

    pub(crate) async fn set_node_urls(&self, node_urls: &NetworkMap<Vec<String>>) -> WalletResult<()> {
        self.repository.set(NODE_URLS, node_urls).await
    }

    pub(crate) async fn accounts(&self) -> WalletResult<Option<NetworkMap<Vec<WalletAccount>>>> {
        self.repository.get(ACCOUNTS).await
    }

    pub(crate) async fn set_accounts(
        &self,
        accounts: &NetworkMap<Vec<WalletAccount>>,
    ) -> WalletResult<()> {
        self.repository.set(ACCOUNTS, accounts).await
    }

    pub(crate) async fn account_infos(&self) -> WalletResult<Option<AccountInfos>> {
        self.repository.get(ACCOUNT_INFOS).await
    }

    pub(crate) async fn set_account_infos(&self, infos: &AccountInfos) -> WalletResult<()> {
        self.repository.set(ACCOUNT_INFOS, infos).await
    }

    pub(crate) async fn seed_addresses(&self) -> WalletResult<Option<NetworkMap<Vec<WalletAccount>>>> {
        self.repository.get(SEED_ADDRESSES).await
    }

    pub(crate) async fn set_seed_addresses(
        &self,
        seed_addresses: &NetworkMap<Vec<WalletAccount>>,
    ) -> WalletResult<()> {
        self.repository.set(SEED_ADDRESSES, seed_addresses).await
    }

    pub(crate) async fn latest_transactions(&self) -> WalletResult<Option<LatestTransactions>> {
        self.repository.get(LATEST_TRANSACTIONS).await
    }

    pub(crate) async fn set_latest_transactions(
        &self,
        transactions: &LatestTransactions,
    ) -> WalletResult<()> {
        self.repository.set(LATEST_TRANSACTIONS, transactions).await
    }

    pub(crate) async fn current_account_public_key(&self) -> WalletResult<Option<String>> {
        self.repository.get(CURRENT_ACCOUNT_PUBLIC_KEY).await
    }

    pub(crate) async fn set_current_account_public_key(
        &self,
        public_key: Option<&String>,
    ) -> WalletResult<()> {
        self.repository
            .set_optional(CURRENT_ACCOUNT_PUBLIC_KEY, public_key)
            .await
    }

    pub(crate) async fn clear(&self) -> WalletResult<()> {
        self.repository.remove_all(&ALL_KEYS).await
    }
}
