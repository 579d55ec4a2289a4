//! In-process publish/subscribe.
//!
//! Each component owns its own [`EventChannel`]; there is no global bus.
//! Listeners for one event name run in subscription order. A listener that
//! panics is isolated: the panic is logged and the remaining listeners still
//! receive the event.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::types::{
    AccountInfo, NetworkConnectionStatus, NetworkProperties, TransactionErrorInfo,
    TransactionGroup, TransactionRecord,
};
use crate::account::WalletAccount;

/// Event payloads carried by a channel.
pub trait Event: Clone + Send + Sync + 'static {
    type Name: Copy + Eq + Hash + Send + Sync + std::fmt::Debug;

    fn name(&self) -> Self::Name;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct EventChannel<E: Event> {
    listeners: RwLock<HashMap<E::Name, Vec<(ListenerId, Listener<E>)>>>,
}

impl<E: Event> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub fn on<F>(&self, name: E::Name, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        self.listeners
            .write()
            .entry(name)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when no listener with this id was registered.
    pub fn remove_listener(&self, name: E::Name, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&name);
        }
        removed
    }

    pub fn listener_count(&self, name: E::Name) -> usize {
        self.listeners.read().get(&name).map_or(0, Vec::len)
    }

    pub(crate) fn emit(&self, event: E) {
        let name = event.name();
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let snapshot: Vec<Listener<E>> = match self.listeners.read().get(&name) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                log::error!("Listener for {:?} panicked; continuing", name);
            }
        }
    }
}

impl<E: Event> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> std::fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("names", &self.listeners.read().len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerEventName {
    StateChanged,
    WalletCleared,
    WalletCreated,
    NewTransaction,
    TransactionRemoved,
    TransactionError,
    AccountChanged,
    AccountInfoChanged,
    NetworkChanged,
    NetworkStatusChanged,
    NetworkPropertiesChanged,
}

/// Events published by the wallet controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged,
    WalletCleared,
    WalletCreated,
    NewTransaction {
        group: TransactionGroup,
        transaction: TransactionRecord,
    },
    TransactionRemoved {
        group: TransactionGroup,
        hash: String,
    },
    TransactionError(TransactionErrorInfo),
    AccountChanged(Option<WalletAccount>),
    AccountInfoChanged {
        public_key: String,
        info: AccountInfo,
    },
    NetworkChanged {
        network_identifier: String,
        node_url: Option<String>,
    },
    NetworkStatusChanged(NetworkConnectionStatus),
    NetworkPropertiesChanged(Option<NetworkProperties>),
}

impl Event for ControllerEvent {
    type Name = ControllerEventName;

    fn name(&self) -> ControllerEventName {
        match self {
            ControllerEvent::StateChanged => ControllerEventName::StateChanged,
            ControllerEvent::WalletCleared => ControllerEventName::WalletCleared,
            ControllerEvent::WalletCreated => ControllerEventName::WalletCreated,
            ControllerEvent::NewTransaction { .. } => ControllerEventName::NewTransaction,
            ControllerEvent::TransactionRemoved { .. } => ControllerEventName::TransactionRemoved,
            ControllerEvent::TransactionError(_) => ControllerEventName::TransactionError,
            ControllerEvent::AccountChanged(_) => ControllerEventName::AccountChanged,
            ControllerEvent::AccountInfoChanged { .. } => ControllerEventName::AccountInfoChanged,
            ControllerEvent::NetworkChanged { .. } => ControllerEventName::NetworkChanged,
            ControllerEvent::NetworkStatusChanged(_) => ControllerEventName::NetworkStatusChanged,
            ControllerEvent::NetworkPropertiesChanged(_) => {
                ControllerEventName::NetworkPropertiesChanged
            }
        }
    }
}
