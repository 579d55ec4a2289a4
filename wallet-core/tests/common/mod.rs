#![allow(dead_code)]

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::json;
use zeroize::Zeroizing;

use wallet_core_lib::{
    AccountApi, AccountInfo, AccountType, AddressBook, ChainEvent, ChainEventHandler,
    ChainListener, ConnectionObserver, Cosignature, Ed25519Sdk, KdfParameters, Keystore,
    KeystoreErrorCode, ListenerApi, ListenerChannel, MemoryStorage, ModuleContext, ModuleFactory,
    NetworkApi, NetworkConnectionStatus, NetworkInfoApi, NetworkMap, NetworkProperties,
    ScopedStorage, SignedTransaction, StorageInterface, Transaction, TransactionApi,
    TransactionGroup, TransactionQuery, TransactionRecord, TransactionStatus, WalletAccount,
    WalletController, WalletControllerBuilder, WalletError, WalletModule, WalletResult,
};

pub const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const NETWORKS: [&str; 2] = ["mainnet", "testnet"];

type Subscriptions = Arc<Mutex<Vec<(ListenerChannel, ChainEventHandler)>>>;

/// Scriptable chain backing every network namespace.
#[derive(Default)]
pub struct MockChain {
    /// Node url -> network it serves. Anything else is unreachable.
    nodes: Mutex<HashMap<String, String>>,
    /// Network -> candidate list. A missing entry fails the fetch.
    node_lists: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    subscriptions: Subscriptions,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    refuse_listeners: AtomicBool,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_node(&self, node_url: &str, network_identifier: &str) {
        self.nodes
            .lock()
            .insert(node_url.to_string(), network_identifier.to_string());
    }

    pub fn with_node_list(&self, network_identifier: &str, node_urls: &[&str]) {
        self.node_lists.lock().insert(
            network_identifier.to_string(),
            node_urls.iter().map(|url| url.to_string()).collect(),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    /// Every listener created from now on fails to open.
    pub fn refuse_listeners(&self) {
        self.refuse_listeners.store(true, Ordering::SeqCst);
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn active_listeners(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }

    /// Deliver an event to every handler subscribed on `channel`.
    pub fn emit(&self, channel: ListenerChannel, event: ChainEvent) {
        let handlers: Vec<ChainEventHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(subscribed, _)| *subscribed == channel)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn api(self: &Arc<Self>) -> NetworkApi {
        NetworkApi::builder()
            .account(self.clone())
            .transaction(self.clone())
            .network(self.clone())
            .listener(self.clone())
            .build()
            .expect("mock implements every namespace")
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn served_network(&self, node_url: &str) -> Option<String> {
        self.nodes.lock().get(node_url).cloned()
    }
}

#[async_trait]
impl AccountApi for MockChain {
    async fn fetch_account_info(
        &self,
        _properties: &NetworkProperties,
        address: &str,
    ) -> WalletResult<AccountInfo> {
        self.record(format!("account_info:{}", address));
        Ok(json!({ "address": address, "balance": 100 }))
    }
}

#[async_trait]
impl TransactionApi for MockChain {
    async fn fetch_account_transactions(
        &self,
        _properties: &NetworkProperties,
        account: &WalletAccount,
        query: &TransactionQuery,
    ) -> WalletResult<Vec<TransactionRecord>> {
        self.record(format!("transactions:{:?}:{}", query.group, query.page_number));
        Ok(vec![TransactionRecord {
            hash: format!(
                "{}-{:?}-{}-{}",
                account.address,
                query.group,
                query.page_number,
                query.filter.len()
            ),
            group: query.group,
            height: Some(10),
            details: serde_json::Value::Null,
        }])
    }

    async fn fetch_transaction_status(
        &self,
        _properties: &NetworkProperties,
        hash: &str,
    ) -> WalletResult<TransactionStatus> {
        self.record(format!("status:{}", hash));
        Ok(TransactionStatus {
            hash: hash.to_string(),
            group: Some(TransactionGroup::Confirmed),
            code: None,
        })
    }

    async fn announce_transaction(
        &self,
        _properties: &NetworkProperties,
        transaction: &SignedTransaction,
    ) -> WalletResult<()> {
        self.record(format!("announce:{}", transaction.hash));
        Ok(())
    }

    async fn announce_transaction_bundle(
        &self,
        _properties: &NetworkProperties,
        transactions: &[SignedTransaction],
    ) -> WalletResult<()> {
        self.record(format!("announce_bundle:{}", transactions.len()));
        Ok(())
    }
}

#[async_trait]
impl NetworkInfoApi for MockChain {
    async fn fetch_network_properties(&self, node_url: &str) -> WalletResult<NetworkProperties> {
        self.record(format!("properties:{}", node_url));
        match self.served_network(node_url) {
            Some(network_identifier) => Ok(NetworkProperties {
                node_url: node_url.to_string(),
                network_identifier,
                chain_height: Some(100),
                details: json!({}),
            }),
            None => Err(WalletError::network(None, "connection refused")),
        }
    }

    async fn ping_node(&self, node_url: &str) -> WalletResult<()> {
        self.record(format!("ping:{}", node_url));
        match self.served_network(node_url) {
            Some(_) => Ok(()),
            None => Err(WalletError::network(Some(503), "node unavailable")),
        }
    }

    async fn fetch_node_list(&self, network_identifier: &str) -> WalletResult<Vec<String>> {
        self.record(format!("node_list:{}", network_identifier));
        self.node_lists
            .lock()
            .get(network_identifier)
            .cloned()
            .ok_or_else(|| WalletError::network(None, "statistics service unreachable"))
    }
}

#[async_trait]
impl ListenerApi for MockChain {
    async fn create_listener(
        &self,
        _properties: &NetworkProperties,
        address: &str,
    ) -> WalletResult<Box<dyn ChainListener>> {
        self.record(format!("listener:{}", address));
        Ok(Box::new(MockListener {
            subscriptions: self.subscriptions.clone(),
            opened: self.opened.clone(),
            closed: self.closed.clone(),
            refuse: self.refuse_listeners.load(Ordering::SeqCst),
            is_open: false,
        }))
    }
}

struct MockListener {
    subscriptions: Subscriptions,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    refuse: bool,
    is_open: bool,
}

#[async_trait]
impl ChainListener for MockListener {
    async fn open(&mut self) -> WalletResult<()> {
        if self.refuse {
            return Err(WalletError::network(None, "websocket refused"));
        }
        self.is_open = true;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(
        &mut self,
        channel: ListenerChannel,
        _address: &str,
        handler: ChainEventHandler,
    ) -> WalletResult<()> {
        self.subscriptions.lock().push((channel, handler));
        Ok(())
    }

    fn close(&mut self) {
        if self.is_open {
            self.is_open = false;
            self.subscriptions.lock().clear();
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Observer that records every notification.
#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<NetworkConnectionStatus>>,
    pub properties: Mutex<Vec<Option<NetworkProperties>>>,
    pub node_urls: Mutex<Vec<Vec<String>>>,
    pub chain_events: Mutex<Vec<ChainEvent>>,
}

#[async_trait]
impl ConnectionObserver for RecordingObserver {
    async fn on_network_properties_changed(
        &self,
        _network_identifier: &str,
        properties: Option<NetworkProperties>,
    ) {
        self.properties.lock().push(properties);
    }

    async fn on_connection_status_changed(
        &self,
        _network_identifier: &str,
        status: NetworkConnectionStatus,
    ) {
        self.statuses.lock().push(status);
    }

    async fn on_node_urls_changed(&self, _network_identifier: &str, node_urls: Vec<String>) {
        self.node_urls.lock().push(node_urls);
    }

    fn on_chain_event(&self, _network_identifier: &str, event: ChainEvent) {
        self.chain_events.lock().push(event);
    }
}

fn unsupported() -> WalletError {
    WalletError::keystore(KeystoreErrorCode::OperationUnsupported, "counting keystore")
}

/// Keystore that only counts lifecycle calls.
#[derive(Default)]
pub struct CountingKeystore {
    pub loads: AtomicUsize,
    pub clears: AtomicUsize,
}

#[async_trait]
impl Keystore for CountingKeystore {
    fn account_type(&self) -> AccountType {
        AccountType::Hardware
    }

    async fn load_cache(&self, _password: Option<&SecretString>) -> WalletResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> WalletResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_accounts(&self) -> NetworkMap<Vec<WalletAccount>> {
        NetworkMap::default()
    }

    async fn get_private_key(&self, _account: &WalletAccount) -> WalletResult<Zeroizing<String>> {
        Err(unsupported())
    }

    async fn sign_transaction(
        &self,
        _properties: &NetworkProperties,
        _transaction: &Transaction,
        _account: &WalletAccount,
    ) -> WalletResult<SignedTransaction> {
        Err(unsupported())
    }

    async fn cosign_transaction(
        &self,
        _properties: &NetworkProperties,
        _transaction: &TransactionRecord,
        _account: &WalletAccount,
    ) -> WalletResult<Cosignature> {
        Err(unsupported())
    }

    async fn encrypt_message(
        &self,
        _message: &str,
        _recipient_public_key: &str,
        _account: &WalletAccount,
    ) -> WalletResult<String> {
        Err(unsupported())
    }

    async fn decrypt_message(
        &self,
        _encrypted_message: &str,
        _sender_public_key: &str,
        _account: &WalletAccount,
    ) -> WalletResult<String> {
        Err(unsupported())
    }
}

#[derive(Default)]
pub struct CountingModule {
    pub loads: AtomicUsize,
    pub resets: AtomicUsize,
    pub clears: AtomicUsize,
}

#[async_trait]
impl WalletModule for CountingModule {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn load_cache(&self) -> WalletResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset_state(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    async fn clear(&self) -> WalletResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Memory storage that fails chosen keys on demand.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    /// Key -> number of writes still to fail.
    failing_writes: Mutex<HashMap<String, usize>>,
    failing_reads: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_write(&self, key: &str) {
        *self.failing_writes.lock().entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn fail_reads(&self, key: &str) {
        self.failing_reads.lock().insert(key.to_string());
    }
}

#[async_trait]
impl StorageInterface for FlakyStorage {
    async fn get_item(&self, key: &str) -> WalletResult<Option<String>> {
        if self.failing_reads.lock().contains(key) {
            return Err(WalletError::StorageError(format!("read of {} failed", key)));
        }
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> WalletResult<()> {
        {
            let mut failing = self.failing_writes.lock();
            if let Some(remaining) = failing.get_mut(key).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(WalletError::StorageError(format!("write of {} failed", key)));
            }
        }
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> WalletResult<()> {
        self.inner.remove_item(key).await
    }

    fn create_scope(self: Arc<Self>, prefix: &str) -> Arc<dyn StorageInterface> {
        Arc::new(ScopedStorage::new(self, prefix))
    }
}

/// Module that asks the chain for the testnet node list on load.
pub struct NodeListModule {
    network_api: NetworkApi,
    pub node_urls: Mutex<Vec<String>>,
}

impl NodeListModule {
    pub fn factory() -> ModuleFactory {
        Box::new(|ctx: &ModuleContext| {
            Arc::new(NodeListModule {
                network_api: ctx.network_api.clone(),
                node_urls: Mutex::new(Vec::new()),
            }) as Arc<dyn WalletModule>
        })
    }
}

#[async_trait]
impl WalletModule for NodeListModule {
    fn name(&self) -> &'static str {
        "node_list"
    }

    async fn load_cache(&self) -> WalletResult<()> {
        let node_urls = self.network_api.network.fetch_node_list("testnet").await?;
        *self.node_urls.lock() = node_urls;
        Ok(())
    }

    fn reset_state(&self) {
        self.node_urls.lock().clear();
    }

    async fn clear(&self) -> WalletResult<()> {
        self.reset_state();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared backends so several controllers can act on the same wallet.
pub struct Harness {
    pub chain: Arc<MockChain>,
    pub persistent: Arc<MemoryStorage>,
    pub secure: Arc<MemoryStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            chain: MockChain::new(),
            persistent: Arc::new(MemoryStorage::new()),
            secure: Arc::new(MemoryStorage::new()),
        }
    }

    /// Testnet reachable through one candidate node.
    pub fn online() -> Self {
        let harness = Self::new();
        harness.chain.with_node("http://testnet-node", "testnet");
        harness.chain.with_node_list("testnet", &["http://testnet-node"]);
        harness.chain.with_node("http://mainnet-node", "mainnet");
        harness.chain.with_node_list("mainnet", &["http://mainnet-node"]);
        harness
    }

    pub fn builder(&self) -> WalletControllerBuilder {
        self.builder_with(self.persistent.clone(), self.secure.clone())
    }

    /// Builder over caller-supplied backends.
    pub fn builder_with(
        &self,
        persistent: Arc<dyn StorageInterface>,
        secure: Arc<dyn StorageInterface>,
    ) -> WalletControllerBuilder {
        WalletController::builder()
            .network_api(self.chain.api())
            .sdk(Arc::new(Ed25519Sdk::new()))
            .persistent_storage(persistent)
            .secure_storage(secure)
            .networks(&NETWORKS)
            .default_network("testnet")
            .polling_interval(Duration::from_secs(3600))
            .kdf_parameters(KdfParameters::minimal())
            .module(AddressBook::factory())
    }

    pub fn controller(&self) -> Arc<WalletController> {
        self.builder().build().expect("controller builds")
    }
}
