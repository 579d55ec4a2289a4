//! Connection lifecycle for the active network.
//!
//! One polling job keeps a usable node: it reuses the last good (or pinned)
//! node, otherwise refreshes the candidate list and walks it in order. Every
//! run reschedules itself after the polling interval until the job is
//! stopped. Results that arrive after the active network changed are
//! discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::api::types::{
    ChainEvent, ListenerChannel, NetworkConnectionStatus, NetworkProperties,
};
use crate::api::{ChainEventHandler, ChainListener, NetworkApi};
use crate::errors::{ApiErrorCode, WalletError, WalletResult};

/// Receives connection changes. Held weakly; a dropped observer silences
/// notifications without stopping the manager.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    async fn on_network_properties_changed(
        &self,
        network_identifier: &str,
        properties: Option<NetworkProperties>,
    );

    async fn on_connection_status_changed(
        &self,
        network_identifier: &str,
        status: NetworkConnectionStatus,
    );

    async fn on_node_urls_changed(&self, network_identifier: &str, node_urls: Vec<String>);

    /// Called from the chain listener's delivery context. Must not block.
    fn on_chain_event(&self, network_identifier: &str, event: ChainEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkManagerState {
    pub network_identifier: String,
    pub network_properties: Option<NetworkProperties>,
    pub connection_status: NetworkConnectionStatus,
    pub node_urls: Vec<String>,
    /// Node pinned by the user. When set, auto-selection is disabled.
    pub selected_node_url: Option<String>,
    pub listen_address: Option<String>,
}

impl NetworkManagerState {
    fn new(
        network_identifier: String,
        network_properties: Option<NetworkProperties>,
        selected_node_url: Option<String>,
    ) -> Self {
        Self {
            network_identifier,
            network_properties,
            connection_status: NetworkConnectionStatus::Initial,
            node_urls: Vec::new(),
            selected_node_url,
            listen_address: None,
        }
    }

    /// Node to try before consulting the candidate list.
    fn known_node(&self) -> Option<String> {
        self.selected_node_url.clone().or_else(|| {
            self.network_properties
                .as_ref()
                .map(|properties| properties.node_url.clone())
        })
    }
}

pub struct NetworkManager {
    api: NetworkApi,
    polling_interval: Duration,
    state: RwLock<NetworkManagerState>,
    listener: Mutex<Option<Box<dyn ChainListener>>>,
    job: Mutex<Option<JoinHandle<()>>>,
    job_enabled: AtomicBool,
    /// Bumped whenever the active network is replaced.
    generation: AtomicU64,
    observer: Weak<dyn ConnectionObserver>,
}

impl NetworkManager {
    pub fn new(
        api: NetworkApi,
        network_identifier: impl Into<String>,
        polling_interval: Duration,
        observer: Weak<dyn ConnectionObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            polling_interval,
            state: RwLock::new(NetworkManagerState::new(network_identifier.into(), None, None)),
            listener: Mutex::new(None),
            job: Mutex::new(None),
            job_enabled: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            observer,
        })
    }

    pub fn state(&self) -> NetworkManagerState {
        self.state.read().clone()
    }

    pub fn network_identifier(&self) -> String {
        self.state.read().network_identifier.clone()
    }

    pub fn connection_status(&self) -> NetworkConnectionStatus {
        self.state.read().connection_status
    }

    pub fn network_properties(&self) -> Option<NetworkProperties> {
        self.state.read().network_properties.clone()
    }

    pub fn node_urls(&self) -> Vec<String> {
        self.state.read().node_urls.clone()
    }

    pub fn has_chain_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Adopt a restored network without touching the node. Status is reset
    /// to `Initial`.
    pub fn init(
        &self,
        network_identifier: &str,
        network_properties: Option<NetworkProperties>,
        selected_node_url: Option<String>,
    ) {
        self.stop_connection_job();
        self.stop_chain_listener();
        self.generation.fetch_add(1, Ordering::SeqCst);

        let listen_address = self.state.read().listen_address.clone();
        let mut state = NetworkManagerState::new(
            network_identifier.to_string(),
            network_properties,
            selected_node_url,
        );
        state.listen_address = listen_address;
        *self.state.write() = state;
        log::debug!("Network manager initialized for {}", network_identifier);
    }

    /// Switch networks: stop everything, reset, and connect.
    pub async fn select_network(
        self: &Arc<Self>,
        network_identifier: &str,
        node_url: Option<String>,
    ) {
        self.stop_connection_job();
        self.stop_chain_listener();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.state.write() =
            NetworkManagerState::new(network_identifier.to_string(), None, node_url);
        log::info!("Switched to network {}", network_identifier);

        self.run_connection_job().await;
    }

    /// Address the chain listener follows. Restarts the listener when
    /// already connected.
    pub async fn set_listen_address(&self, address: Option<String>) {
        let connected = {
            let mut state = self.state.write();
            state.listen_address = address;
            state.connection_status == NetworkConnectionStatus::Connected
        };
        if connected {
            self.restart_chain_listener().await;
        } else {
            self.stop_chain_listener();
        }
    }

    pub async fn start_connection_job(self: &Arc<Self>) {
        self.run_connection_job().await;
    }

    pub fn stop_connection_job(&self) {
        self.job_enabled.store(false, Ordering::SeqCst);
        if let Some(handle) = self.job.lock().take() {
            handle.abort();
        }
    }

    pub fn is_connection_job_scheduled(&self) -> bool {
        self.job_enabled.load(Ordering::SeqCst)
            && self
                .job
                .lock()
                .as_ref()
                .map_or(false, |handle| !handle.is_finished())
    }

    /// Run one connection step now, then keep polling.
    pub async fn run_connection_job(self: &Arc<Self>) {
        if let Some(pending) = self.job.lock().take() {
            pending.abort();
        }
        self.job_enabled.store(true, Ordering::SeqCst);
        self.connection_step().await;
        self.schedule_next_run();
    }

    fn schedule_next_run(self: &Arc<Self>) {
        if !self.job_enabled.load(Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(self);
        let interval = self.polling_interval;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(manager) = weak.upgrade() {
                manager.scheduled_run().await;
            }
        });
        // The replaced handle belongs to the run that is finishing now.
        *self.job.lock() = Some(handle);
    }

    fn scheduled_run(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            if !self.job_enabled.load(Ordering::SeqCst) {
                return;
            }
            self.connection_step().await;
            self.schedule_next_run();
        }
        .boxed()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn connection_step(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let (network_identifier, known_node, pinned, previous_status) = {
            let state = self.state.read();
            (
                state.network_identifier.clone(),
                state.known_node(),
                state.selected_node_url.is_some(),
                state.connection_status,
            )
        };

        if let Some(node_url) = known_node {
            match self.connect_to_node(&node_url, generation).await {
                Ok(()) => return,
                Err(e) => log::warn!("Node {} is unusable: {}", node_url, e),
            }
        }

        let node_urls = match self.api.network.fetch_node_list(&network_identifier).await {
            Ok(node_urls) => node_urls,
            Err(e) => {
                log::warn!("Failed to fetch node list for {}: {}", network_identifier, e);
                self.set_status(generation, NetworkConnectionStatus::NoInternet)
                    .await;
                return;
            }
        };
        if !self.is_current(generation) {
            return;
        }
        self.state.write().node_urls = node_urls.clone();
        if let Some(observer) = self.observer.upgrade() {
            observer
                .on_node_urls_changed(&network_identifier, node_urls.clone())
                .await;
        }

        let status = if pinned
            && matches!(
                previous_status,
                NetworkConnectionStatus::Connecting | NetworkConnectionStatus::FailedCustomNode
            ) {
            NetworkConnectionStatus::FailedCustomNode
        } else {
            NetworkConnectionStatus::Connecting
        };
        self.set_status(generation, status).await;

        if pinned {
            return;
        }

        for node_url in &node_urls {
            if !self.is_current(generation) {
                return;
            }
            if let Err(e) = self.api.network.ping_node(node_url).await {
                log::debug!("Node {} did not answer: {}", node_url, e);
                continue;
            }
            match self.connect_to_node(node_url, generation).await {
                Ok(()) => return,
                Err(e) => log::debug!("Node {} rejected: {}", node_url, e),
            }
        }
        log::info!("No reachable node for {}", network_identifier);
    }

    async fn connect_to_node(&self, node_url: &str, generation: u64) -> WalletResult<()> {
        let properties = self.fetch_network_properties(node_url).await?;
        if !self.is_current(generation) {
            return Ok(());
        }

        let network_identifier = {
            let mut state = self.state.write();
            state.network_properties = Some(properties.clone());
            state.network_identifier.clone()
        };
        if let Some(observer) = self.observer.upgrade() {
            observer
                .on_network_properties_changed(&network_identifier, Some(properties))
                .await;
        }

        self.restart_chain_listener().await;
        self.set_status(generation, NetworkConnectionStatus::Connected)
            .await;
        Ok(())
    }

    /// Fetch a node's properties, rejecting nodes serving another network.
    pub async fn fetch_network_properties(&self, node_url: &str) -> WalletResult<NetworkProperties> {
        let properties = self.api.network.fetch_network_properties(node_url).await?;
        let expected = self.network_identifier();
        if properties.network_identifier != expected {
            return Err(WalletError::api(
                ApiErrorCode::NetworkIdentifierMismatch,
                format!(
                    "Node {} serves '{}', expected '{}'",
                    node_url, properties.network_identifier, expected
                ),
            ));
        }
        Ok(properties)
    }

    async fn set_status(&self, generation: u64, status: NetworkConnectionStatus) {
        if !self.is_current(generation) {
            return;
        }
        let (changed, network_identifier) = {
            let mut state = self.state.write();
            let changed = state.connection_status != status;
            state.connection_status = status;
            (changed, state.network_identifier.clone())
        };
        if !changed {
            return;
        }
        log::debug!("{} connection status: {:?}", network_identifier, status);
        if let Some(observer) = self.observer.upgrade() {
            observer
                .on_connection_status_changed(&network_identifier, status)
                .await;
        }
    }

    async fn restart_chain_listener(&self) {
        if let Err(e) = self.start_chain_listener().await {
            log::warn!("{}", e);
        }
    }

    /// Replace the chain listener with one bound to the current properties
    /// and listen address. Without both nothing is started.
    pub async fn start_chain_listener(&self) -> WalletResult<()> {
        self.stop_chain_listener();

        let (properties, address, network_identifier) = {
            let state = self.state.read();
            (
                state.network_properties.clone(),
                state.listen_address.clone(),
                state.network_identifier.clone(),
            )
        };
        let (Some(properties), Some(address)) = (properties, address) else {
            log::debug!("Chain listener not started: no properties or address");
            return Ok(());
        };

        let open_failed = |e: WalletError| {
            WalletError::api(
                ApiErrorCode::ListenerOpenFailed,
                format!("Chain listener for {} did not open: {}", address, e),
            )
        };
        let mut listener = self
            .api
            .listener
            .create_listener(&properties, &address)
            .await
            .map_err(open_failed)?;
        listener.open().await.map_err(open_failed)?;

        let observer = self.observer.clone();
        let network = network_identifier.clone();
        let handler: ChainEventHandler = Arc::new(move |event: ChainEvent| {
            if let Some(observer) = observer.upgrade() {
                observer.on_chain_event(&network, event);
            }
        });
        for channel in ListenerChannel::ALL {
            if let Err(e) = listener.subscribe(channel, &address, handler.clone()) {
                log::warn!("Failed to subscribe to {:?}: {}", channel, e);
            }
        }

        // A concurrent start may have installed one meanwhile.
        let previous = self.listener.lock().replace(listener);
        if let Some(mut previous) = previous {
            previous.close();
        }
        log::debug!("Chain listener started for {} on {}", address, network_identifier);
        Ok(())
    }

    /// Close and drop the listener. No-op when none is running.
    pub fn stop_chain_listener(&self) {
        let listener = self.listener.lock().take();
        if let Some(mut listener) = listener {
            listener.close();
        }
    }
}

impl Drop for NetworkManager {
    fn drop(&mut self) {
        if let Some(handle) = self.job.get_mut().take() {
            handle.abort();
        }
        if let Some(mut listener) = self.listener.get_mut().take() {
            listener.close();
        }
    }
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("state", &*self.state.read())
            .field("polling_interval", &self.polling_interval)
            .finish_non_exhaustive()
    }
}
