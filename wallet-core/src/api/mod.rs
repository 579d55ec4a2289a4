//! Protocol façades the wallet core consumes.
//!
//! Chain-specific adapters implement these traits; the core never speaks a
//! wire format itself. The network API is grouped into four namespaces that
//! are assembled through [`NetworkApiBuilder`], which rejects an incomplete
//! set up front instead of failing at call time.

pub mod json_rpc;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::account::WalletAccount;
use crate::errors::{ControllerErrorCode, WalletError, WalletResult};
use types::{
    AccountInfo, ChainEvent, ListenerChannel, NetworkProperties, SignedTransaction,
    TransactionQuery, TransactionRecord, TransactionStatus,
};

#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn fetch_account_info(
        &self,
        properties: &NetworkProperties,
        address: &str,
    ) -> WalletResult<AccountInfo>;
}

#[async_trait]
pub trait TransactionApi: Send + Sync {
    async fn fetch_account_transactions(
        &self,
        properties: &NetworkProperties,
        account: &WalletAccount,
        query: &TransactionQuery,
    ) -> WalletResult<Vec<TransactionRecord>>;

    async fn fetch_transaction_status(
        &self,
        properties: &NetworkProperties,
        hash: &str,
    ) -> WalletResult<TransactionStatus>;

    async fn announce_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &SignedTransaction,
    ) -> WalletResult<()>;

    async fn announce_transaction_bundle(
        &self,
        properties: &NetworkProperties,
        transactions: &[SignedTransaction],
    ) -> WalletResult<()>;
}

#[async_trait]
pub trait NetworkInfoApi: Send + Sync {
    async fn fetch_network_properties(&self, node_url: &str) -> WalletResult<NetworkProperties>;

    async fn ping_node(&self, node_url: &str) -> WalletResult<()>;

    async fn fetch_node_list(&self, network_identifier: &str) -> WalletResult<Vec<String>>;
}

pub type ChainEventHandler = Arc<dyn Fn(ChainEvent) + Send + Sync>;

/// A live event subscription for one address.
///
/// After `close` returns no handler registered through `subscribe` may be
/// invoked again.
#[async_trait]
pub trait ChainListener: Send + Sync {
    async fn open(&mut self) -> WalletResult<()>;

    fn subscribe(
        &mut self,
        channel: ListenerChannel,
        address: &str,
        handler: ChainEventHandler,
    ) -> WalletResult<()>;

    fn close(&mut self);
}

#[async_trait]
pub trait ListenerApi: Send + Sync {
    async fn create_listener(
        &self,
        properties: &NetworkProperties,
        address: &str,
    ) -> WalletResult<Box<dyn ChainListener>>;
}

/// Complete set of network namespaces.
#[derive(Clone)]
pub struct NetworkApi {
    pub account: Arc<dyn AccountApi>,
    pub transaction: Arc<dyn TransactionApi>,
    pub network: Arc<dyn NetworkInfoApi>,
    pub listener: Arc<dyn ListenerApi>,
}

impl NetworkApi {
    pub fn builder() -> NetworkApiBuilder {
        NetworkApiBuilder::default()
    }
}

impl std::fmt::Debug for NetworkApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkApi").finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct NetworkApiBuilder {
    account: Option<Arc<dyn AccountApi>>,
    transaction: Option<Arc<dyn TransactionApi>>,
    network: Option<Arc<dyn NetworkInfoApi>>,
    listener: Option<Arc<dyn ListenerApi>>,
}

impl NetworkApiBuilder {
    pub fn account(mut self, api: Arc<dyn AccountApi>) -> Self {
        self.account = Some(api);
        self
    }

    pub fn transaction(mut self, api: Arc<dyn TransactionApi>) -> Self {
        self.transaction = Some(api);
        self
    }

    pub fn network(mut self, api: Arc<dyn NetworkInfoApi>) -> Self {
        self.network = Some(api);
        self
    }

    pub fn listener(mut self, api: Arc<dyn ListenerApi>) -> Self {
        self.listener = Some(api);
        self
    }

    pub fn build(self) -> WalletResult<NetworkApi> {
        let mut missing = Vec::new();
        if self.account.is_none() {
            missing.push("account");
        }
        if self.transaction.is_none() {
            missing.push("transaction");
        }
        if self.network.is_none() {
            missing.push("network");
        }
        if self.listener.is_none() {
            missing.push("listener");
        }

        match (self.account, self.transaction, self.network, self.listener) {
            (Some(account), Some(transaction), Some(network), Some(listener)) => Ok(NetworkApi {
                account,
                transaction,
                network,
                listener,
            }),
            _ => Err(WalletError::controller(
                ControllerErrorCode::MissingCapability,
                format!("Network API is missing namespaces: {}", missing.join(", ")),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopNetwork;

    #[async_trait]
    impl NetworkInfoApi for NoopNetwork {
        async fn fetch_network_properties(&self, node_url: &str) -> WalletResult<NetworkProperties> {
            Ok(NetworkProperties {
                node_url: node_url.to_string(),
                network_identifier: "testnet".into(),
                chain_height: None,
                details: serde_json::Value::Null,
            })
        }

        async fn ping_node(&self, _node_url: &str) -> WalletResult<()> {
            Ok(())
        }

        async fn fetch_node_list(&self, _network_identifier: &str) -> WalletResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn builder_lists_every_missing_namespace() {
        let err = NetworkApi::builder()
            .network(Arc::new(NoopNetwork))
            .build()
            .unwrap_err();
        assert!(err.is_controller(ControllerErrorCode::MissingCapability));
        assert!(err.message().contains("account"));
        assert!(err.message().contains("transaction"));
        assert!(err.message().contains("listener"));
        assert!(!err.message().contains("network,"));
    }
}
