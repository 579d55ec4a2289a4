//! Top-level wallet orchestration.
//!
//! The controller owns the per-network account lists and caches, composes the
//! keystores, the network manager and the feature modules, and keeps the
//! persisted slices and the in-memory [`ControllerState`] in step. Each
//! mutating call persists its slice before applying it in memory, then emits
//! its specific event followed by `StateChanged`.

mod accounts;
mod signing;
mod state;
mod storage;

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::SecretString;

use crate::account::{AccountType, WalletAccount};
use crate::api::types::{
    ChainEvent, NetworkConnectionStatus, NetworkProperties, TransactionGroup, TransactionQuery,
};
use crate::api::NetworkApi;
use crate::config_store::{WalletConfig, DEFAULT_POLLING_INTERVAL_SECS};
use crate::errors::{ControllerErrorCode, WalletError, WalletResult};
use crate::events::{ControllerEvent, ControllerEventName, EventChannel, ListenerId};
use crate::keystore::{
    default_keystore_factories, ExternalAccountKeystore, HardwareKeystore, KeystoreContext,
    KeystoreFactory, KeystoreHandle, MnemonicKeystore,
};
use crate::modules::{ModuleContext, ModuleFactory, WalletModule};
use crate::network_manager::{ConnectionObserver, NetworkManager};
use crate::network_map::NetworkMap;
use crate::sdk::SigningSdk;
use crate::security::SecurityConfig;
use crate::storage::{
    KdfParameters, SecureStorageRepository, StorageInterface, StorageRepository,
};
use crate::validation::InputValidator;

pub use accounts::{
    ExternalAccountParams, HardwareAccountParams, MnemonicWalletParams, SeedAccountParams,
};
pub use state::ControllerState;
pub use storage::{AccountInfos, LatestTransactions};

use storage::ControllerStorage;

pub struct WalletController {
    networks: Vec<String>,
    default_network: String,
    network_api: NetworkApi,
    sdk: Arc<dyn SigningSdk>,
    storage: ControllerStorage,
    network_manager: Arc<NetworkManager>,
    keystores: Vec<KeystoreHandle>,
    modules: Vec<Arc<dyn WalletModule>>,
    default_page_size: u32,
    state: RwLock<ControllerState>,
    events: EventChannel<ControllerEvent>,
    this: Weak<WalletController>,
}

impl WalletController {
    pub fn builder() -> WalletControllerBuilder {
        WalletControllerBuilder::default()
    }

    // ---- lifecycle ----

    /// Restore every persisted slice, then bring keystores and modules up
    /// and re-select the persisted account.
    ///
    /// Storage and keystore failures abort the load.
    pub async fn load_cache(&self, password: Option<&SecretString>) -> WalletResult<()> {
        let storage = &self.storage;
        let (
            persisted_network,
            selected_node_url,
            network_properties,
            node_urls,
            wallet_accounts,
            account_infos,
            seed_addresses,
            latest_transactions,
            current_account_public_key,
        ) = tokio::try_join!(
            storage.network_identifier(),
            storage.selected_node(),
            storage.network_properties(),
            storage.node_urls(),
            storage.accounts(),
            storage.account_infos(),
            storage.seed_addresses(),
            storage.latest_transactions(),
            storage.current_account_public_key(),
        )?;

        let (network_identifier, selected_node_url) = match persisted_network {
            Some(network) if self.is_supported_network(&network) => (network, selected_node_url),
            Some(network) => {
                log::warn!(
                    "Persisted network {} is no longer configured, using {}",
                    network,
                    self.default_network
                );
                (self.default_network.clone(), None)
            }
            None => (self.default_network.clone(), selected_node_url),
        };
        let network_properties = network_properties
            .filter(|properties| properties.network_identifier == network_identifier);

        let state = ControllerState {
            is_cache_loaded: false,
            network_identifier: network_identifier.clone(),
            network_properties: network_properties.clone(),
            network_status: NetworkConnectionStatus::Initial,
            node_urls: NetworkMap::restore(node_urls, &self.networks),
            selected_node_url: selected_node_url.clone(),
            wallet_accounts: NetworkMap::restore(wallet_accounts, &self.networks),
            account_infos: NetworkMap::restore(account_infos, &self.networks),
            current_account_public_key: current_account_public_key.clone(),
            seed_addresses: NetworkMap::restore(seed_addresses, &self.networks),
            latest_transactions: NetworkMap::restore(latest_transactions, &self.networks),
        };
        let has_current_account = state.current_account().is_some();
        *self.state.write() = state;

        self.network_manager
            .init(&network_identifier, network_properties, selected_node_url);

        for handle in &self.keystores {
            handle.keystore().load_cache(password).await?;
        }
        for module in &self.modules {
            module.load_cache().await?;
        }
        self.state.write().is_cache_loaded = true;
        log::info!("Wallet cache loaded for network {}", network_identifier);

        match current_account_public_key {
            Some(public_key) if has_current_account => self.select_account(&public_key).await,
            Some(public_key) => {
                log::warn!(
                    "Persisted account {} is not present on {}",
                    public_key,
                    network_identifier
                );
                self.emit(ControllerEvent::StateChanged);
                Ok(())
            }
            None => {
                self.emit(ControllerEvent::StateChanged);
                Ok(())
            }
        }
    }

    /// Erase the wallet: storage, keystores, modules and in-memory state.
    ///
    /// When a password is given and a mnemonic is stored, the password must
    /// open it before anything is erased.
    pub async fn clear(&self, password: Option<&SecretString>) -> WalletResult<()> {
        if let (Some(password), Some(keystore)) = (password, self.mnemonic_keystore()) {
            if keystore.has_mnemonic() {
                keystore.get_mnemonic(Some(password)).await?;
            }
        }

        self.network_manager.stop_connection_job();
        self.network_manager.stop_chain_listener();

        self.storage.clear().await?;
        for handle in &self.keystores {
            handle.keystore().clear().await?;
        }
        for module in &self.modules {
            module.clear().await?;
        }

        *self.state.write() = self.initial_state();
        self.network_manager.init(&self.default_network, None, None);
        self.network_manager.set_listen_address(None).await;
        log::info!("Wallet cleared");

        self.emit_change(ControllerEvent::WalletCleared);
        Ok(())
    }

    /// Back to defaults in memory only. Storage is left untouched.
    pub fn reset_state(&self) {
        *self.state.write() = self.initial_state();
        for module in &self.modules {
            module.reset_state();
        }
        self.emit(ControllerEvent::StateChanged);
    }

    // ---- network ----

    pub async fn connect_to_network(&self) {
        self.network_manager.start_connection_job().await;
    }

    pub async fn select_network(
        &self,
        network_identifier: &str,
        node_url: Option<String>,
    ) -> WalletResult<()> {
        if !self.is_supported_network(network_identifier) {
            return Err(WalletError::controller(
                ControllerErrorCode::NetworkNotSupported,
                format!("Network {} is not supported", network_identifier),
            ));
        }
        if let Some(url) = &node_url {
            InputValidator::validate_node_url(url)?;
        }

        self.storage.set_network_identifier(network_identifier).await?;
        self.storage.set_selected_node(node_url.as_ref()).await?;
        self.storage.set_network_properties(None).await?;
        {
            let mut state = self.state.write();
            state.network_identifier = network_identifier.to_string();
            state.selected_node_url = node_url.clone();
            state.network_properties = None;
            state.network_status = NetworkConnectionStatus::Initial;
        }
        self.emit_change(ControllerEvent::NetworkChanged {
            network_identifier: network_identifier.to_string(),
            node_url: node_url.clone(),
        });

        self.network_manager
            .select_network(network_identifier, node_url)
            .await;

        let first_account = self.state.read().accounts().first().cloned();
        match first_account {
            Some(account) => self.select_account(&account.public_key).await,
            None => {
                self.storage.set_current_account_public_key(None).await?;
                self.state.write().current_account_public_key = None;
                self.network_manager.set_listen_address(None).await;
                self.emit_change(ControllerEvent::AccountChanged(None));
                Ok(())
            }
        }
    }

    // ---- accessors ----

    pub fn state(&self) -> ControllerState {
        self.state.read().clone()
    }

    pub fn current_account(&self) -> Option<WalletAccount> {
        self.state.read().current_account()
    }

    /// Accounts of the active network.
    pub fn accounts(&self) -> Vec<WalletAccount> {
        self.state.read().accounts().to_vec()
    }

    pub fn network_identifier(&self) -> String {
        self.state.read().network_identifier.clone()
    }

    pub fn network_properties(&self) -> Option<NetworkProperties> {
        self.state.read().network_properties.clone()
    }

    pub fn network_status(&self) -> NetworkConnectionStatus {
        self.state.read().network_status
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    /// First confirmed page at the configured page size.
    pub fn default_transaction_query(&self) -> TransactionQuery {
        TransactionQuery::default().with_page_size(self.default_page_size)
    }

    /// Whether any network holds at least one account.
    pub fn has_accounts(&self) -> bool {
        self.state
            .read()
            .wallet_accounts
            .iter()
            .any(|(_, accounts)| !accounts.is_empty())
    }

    pub fn is_wallet_ready(&self) -> bool {
        let is_cache_loaded = self.state.read().is_cache_loaded;
        is_cache_loaded && self.has_accounts()
    }

    pub fn network_manager(&self) -> &Arc<NetworkManager> {
        &self.network_manager
    }

    pub fn keystores(&self) -> &[KeystoreHandle] {
        &self.keystores
    }

    pub fn mnemonic_keystore(&self) -> Option<&Arc<MnemonicKeystore>> {
        self.keystores.iter().find_map(|handle| match handle {
            KeystoreHandle::Mnemonic(keystore) => Some(keystore),
            _ => None,
        })
    }

    pub fn external_keystore(&self) -> Option<&Arc<ExternalAccountKeystore>> {
        self.keystores.iter().find_map(|handle| match handle {
            KeystoreHandle::External(keystore) => Some(keystore),
            _ => None,
        })
    }

    pub fn hardware_keystore(&self) -> Option<&Arc<HardwareKeystore>> {
        self.keystores.iter().find_map(|handle| match handle {
            KeystoreHandle::Hardware(keystore) => Some(keystore),
            _ => None,
        })
    }

    /// Typed access to a registered module.
    pub fn module<T: WalletModule + 'static>(&self) -> Option<&T> {
        self.modules
            .iter()
            .find_map(|module| module.as_any().downcast_ref::<T>())
    }

    // ---- events ----

    pub fn events(&self) -> &EventChannel<ControllerEvent> {
        &self.events
    }

    pub fn on<F>(&self, name: ControllerEventName, listener: F) -> ListenerId
    where
        F: Fn(&ControllerEvent) + Send + Sync + 'static,
    {
        self.events.on(name, listener)
    }

    pub fn remove_listener(&self, name: ControllerEventName, id: ListenerId) -> bool {
        self.events.remove_listener(name, id)
    }

    fn emit(&self, event: ControllerEvent) {
        self.events.emit(event);
    }

    /// Specific event first, then the generic one.
    fn emit_change(&self, event: ControllerEvent) {
        self.events.emit(event);
        self.events.emit(ControllerEvent::StateChanged);
    }

    // ---- helpers ----

    fn initial_state(&self) -> ControllerState {
        ControllerState::initial(&self.networks, &self.default_network)
    }

    fn is_supported_network(&self, network_identifier: &str) -> bool {
        self.networks.iter().any(|network| network == network_identifier)
    }

    fn ensure_supported_network(&self, network_identifier: &str) -> WalletResult<()> {
        if self.is_supported_network(network_identifier) {
            Ok(())
        } else {
            Err(WalletError::controller(
                ControllerErrorCode::NetworkNotSupported,
                format!("Network {} is not supported", network_identifier),
            ))
        }
    }

    fn is_active_network(&self, network_identifier: &str) -> bool {
        self.state.read().network_identifier == network_identifier
    }

    fn refresh_account_info_in_background(&self) {
        let Some(controller) = self.this.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("No runtime available for account refresh");
            return;
        };
        runtime.spawn(async move {
            if let Err(error) = controller.fetch_account_info().await {
                log::warn!("Account info refresh after confirmation failed: {}", error);
            }
        });
    }
}

#[async_trait]
impl ConnectionObserver for WalletController {
    async fn on_network_properties_changed(
        &self,
        network_identifier: &str,
        properties: Option<NetworkProperties>,
    ) {
        if !self.is_active_network(network_identifier) {
            return;
        }
        if let Err(error) = self.storage.set_network_properties(properties.as_ref()).await {
            log::error!("Failed to persist network properties: {}", error);
        }
        self.state.write().network_properties = properties.clone();
        self.emit_change(ControllerEvent::NetworkPropertiesChanged(properties));
    }

    async fn on_connection_status_changed(
        &self,
        network_identifier: &str,
        status: NetworkConnectionStatus,
    ) {
        if !self.is_active_network(network_identifier) {
            return;
        }
        self.state.write().network_status = status;
        log::debug!("Network {} status: {:?}", network_identifier, status);
        self.emit_change(ControllerEvent::NetworkStatusChanged(status));
    }

    async fn on_node_urls_changed(&self, network_identifier: &str, node_urls: Vec<String>) {
        if !self.is_supported_network(network_identifier) {
            return;
        }
        let mut all_node_urls = self.state.read().node_urls.clone();
        all_node_urls.insert(network_identifier, node_urls);
        if let Err(error) = self.storage.set_node_urls(&all_node_urls).await {
            log::error!("Failed to persist node list: {}", error);
        }
        self.state.write().node_urls = all_node_urls;
        self.emit(ControllerEvent::StateChanged);
    }

    fn on_chain_event(&self, network_identifier: &str, event: ChainEvent) {
        if !self.is_active_network(network_identifier) {
            return;
        }
        match event {
            ChainEvent::TransactionAdded(transaction) => {
                let group = transaction.group;
                self.emit(ControllerEvent::NewTransaction { group, transaction });
                if group == TransactionGroup::Confirmed {
                    self.refresh_account_info_in_background();
                }
            }
            ChainEvent::TransactionRemoved { group, hash } => {
                self.emit(ControllerEvent::TransactionRemoved { group, hash });
            }
            ChainEvent::TransactionError(error) => {
                self.emit(ControllerEvent::TransactionError(error));
            }
        }
    }
}

impl std::fmt::Debug for WalletController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletController")
            .field("networks", &self.networks)
            .field("network_identifier", &self.network_identifier())
            .field("keystores", &self.keystores)
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Collects the controller's collaborators and validates them before
/// anything is constructed.
pub struct WalletControllerBuilder {
    network_api: Option<NetworkApi>,
    sdk: Option<Arc<dyn SigningSdk>>,
    persistent_storage: Option<Arc<dyn StorageInterface>>,
    secure_storage: Option<Arc<dyn StorageInterface>>,
    networks: Vec<String>,
    default_network: Option<String>,
    polling_interval: Duration,
    kdf: KdfParameters,
    security: Option<SecurityConfig>,
    default_page_size: u32,
    keystore_factories: Vec<KeystoreFactory>,
    module_factories: Vec<ModuleFactory>,
}

impl Default for WalletControllerBuilder {
    fn default() -> Self {
        Self {
            network_api: None,
            sdk: None,
            persistent_storage: None,
            secure_storage: None,
            networks: Vec::new(),
            default_network: None,
            polling_interval: Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS),
            kdf: KdfParameters::default(),
            security: None,
            default_page_size: TransactionQuery::DEFAULT_PAGE_SIZE,
            keystore_factories: default_keystore_factories(),
            module_factories: Vec::new(),
        }
    }
}

impl WalletControllerBuilder {
    pub fn network_api(mut self, api: NetworkApi) -> Self {
        self.network_api = Some(api);
        self
    }

    pub fn sdk(mut self, sdk: Arc<dyn SigningSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn persistent_storage(mut self, storage: Arc<dyn StorageInterface>) -> Self {
        self.persistent_storage = Some(storage);
        self
    }

    pub fn secure_storage(mut self, storage: Arc<dyn StorageInterface>) -> Self {
        self.secure_storage = Some(storage);
        self
    }

    pub fn networks(mut self, networks: &[&str]) -> Self {
        self.networks = networks.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn default_network(mut self, network_identifier: &str) -> Self {
        self.default_network = Some(network_identifier.to_string());
        self
    }

    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn kdf_parameters(mut self, kdf: KdfParameters) -> Self {
        self.kdf = kdf;
        self
    }

    /// Networks, polling interval, page size and KDF strength from a loaded
    /// config.
    pub fn config(mut self, config: &WalletConfig) -> Self {
        self.networks = config.networks.clone();
        self.default_network = Some(config.default_network.clone());
        self.polling_interval = config.polling_interval();
        self.default_page_size = config.default_page_size;
        self.kdf = config.environment.kdf_parameters();
        self
    }

    /// Take KDF strength from security settings, explicit `WALLET_KDF_*`
    /// overrides included. Invalid values fail `build`.
    pub fn security(mut self, config: &SecurityConfig) -> Self {
        self.security = Some(config.clone());
        self
    }

    /// Replace the default keystore set.
    pub fn keystores(mut self, factories: Vec<KeystoreFactory>) -> Self {
        self.keystore_factories = factories;
        self
    }

    pub fn keystore(mut self, factory: KeystoreFactory) -> Self {
        self.keystore_factories.push(factory);
        self
    }

    pub fn module(mut self, factory: ModuleFactory) -> Self {
        self.module_factories.push(factory);
        self
    }

    pub fn build(self) -> WalletResult<Arc<WalletController>> {
        let mut missing = Vec::new();
        if self.network_api.is_none() {
            missing.push("network api");
        }
        if self.sdk.is_none() {
            missing.push("signing sdk");
        }
        if self.persistent_storage.is_none() {
            missing.push("persistent storage");
        }
        if self.secure_storage.is_none() {
            missing.push("secure storage");
        }
        let (Some(network_api), Some(sdk), Some(persistent), Some(secure)) = (
            self.network_api,
            self.sdk,
            self.persistent_storage,
            self.secure_storage,
        ) else {
            return Err(WalletError::controller(
                ControllerErrorCode::MissingCapability,
                format!("Wallet controller is missing: {}", missing.join(", ")),
            ));
        };

        if self.networks.is_empty() {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                "At least one network must be configured",
            ));
        }
        let default_network = self
            .default_network
            .unwrap_or_else(|| self.networks[0].clone());
        if !self.networks.contains(&default_network) {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                format!("Default network {} is not configured", default_network),
            ));
        }

        let kdf = match &self.security {
            Some(security) => security.kdf_parameters()?,
            None => self.kdf,
        };
        let networks = self.networks;
        let polling_interval = self.polling_interval;
        let default_page_size = self.default_page_size;
        let persistent_storage = StorageRepository::new(persistent);
        let keystore_context = KeystoreContext {
            secure_storage: SecureStorageRepository::new(secure, kdf),
            persistent_storage: persistent_storage.clone(),
            sdk: sdk.clone(),
            networks: networks.clone(),
        };
        let keystore_factories = self.keystore_factories;
        let module_factories = self.module_factories;

        let controller = Arc::new_cyclic(|this: &Weak<WalletController>| {
            let observer: Weak<dyn ConnectionObserver> = this.clone();
            let network_manager = NetworkManager::new(
                network_api.clone(),
                default_network.clone(),
                polling_interval,
                observer,
            );

            let keystores: Vec<KeystoreHandle> = keystore_factories
                .into_iter()
                .map(|factory| factory(&keystore_context))
                .collect();

            let module_context = ModuleContext {
                controller: this.clone(),
                network_api: network_api.clone(),
                persistent_storage: persistent_storage.clone(),
            };
            let modules: Vec<Arc<dyn WalletModule>> = module_factories
                .into_iter()
                .map(|factory| factory(&module_context))
                .collect();

            WalletController {
                state: RwLock::new(ControllerState::initial(&networks, &default_network)),
                networks,
                default_network,
                network_api,
                sdk,
                storage: ControllerStorage::new(&persistent_storage),
                network_manager,
                keystores,
                modules,
                default_page_size,
                events: EventChannel::new(),
                this: this.clone(),
            }
        });

        log::info!(
            "Wallet controller ready with {} keystores and {} modules",
            controller.keystores.len(),
            controller.modules.len()
        );
        Ok(controller)
    }
}

pub(crate) fn keystore_missing(account_type: AccountType) -> WalletError {
    WalletError::controller(
        ControllerErrorCode::KeystoreNotAvailable,
        format!("No keystore is registered for {} accounts", account_type),
    )
}
