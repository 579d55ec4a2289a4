// lib.rs - Core library structure for the wallet state orchestrator

pub mod account;
pub mod api;
pub mod config_store;
pub mod controller;
pub mod errors;
pub mod events;
pub mod keystore;
pub mod modules;
pub mod network_manager;
pub mod network_map;
pub mod sdk;
pub mod security;
pub mod storage;
pub mod validation;

pub mod wallet {
    //! Process-level setup

    use crate::errors::WalletResult;
    use crate::security::{init_security_config, Environment, SecurityConfig};

    /// Initialize the wallet subsystem for an environment. Safe to call more
    /// than once; the first environment wins.
    pub fn init(environment: Environment) -> WalletResult<&'static SecurityConfig> {
        log::info!("Initializing wallet subsystem ({})", environment);

        let config = init_security_config(environment)?;
        log::info!(
            "Security configuration initialized for {}",
            config.environment()
        );

        Ok(config)
    }
}

// Re-export common types
pub use account::{AccountType, PrivateAccount, WalletAccount};
pub use api::types::*;
pub use api::{
    AccountApi, ChainEventHandler, ChainListener, ListenerApi, NetworkApi, NetworkInfoApi,
    TransactionApi,
};
pub use config_store::{ConfigStore, WalletConfig};
pub use controller::{
    ControllerState, ExternalAccountParams, HardwareAccountParams, MnemonicWalletParams,
    SeedAccountParams, WalletController, WalletControllerBuilder,
};
pub use errors::{
    ApiErrorCode, ControllerErrorCode, KeystoreErrorCode, NetworkErrorKind, WalletError,
    WalletResult,
};
pub use events::{ControllerEvent, ControllerEventName, EventChannel, ListenerId};
pub use keystore::{
    ExternalAccountKeystore, HardwareDevice, HardwareKeystore, Keystore, KeystoreContext,
    KeystoreFactory, KeystoreHandle, MnemonicKeystore,
};
pub use modules::{
    AddressBook, Contact, ContactParams, ModuleContext, ModuleFactory, WalletModule,
};
pub use network_manager::{ConnectionObserver, NetworkManager, NetworkManagerState};
pub use network_map::NetworkMap;
pub use sdk::{Ed25519Sdk, SigningSdk};
pub use security::{Environment, SecurityConfig};
pub use storage::{
    FileStorage, KdfParameters, MemoryStorage, ScopedStorage, SecureStorageRepository,
    StorageInterface, StorageRepository,
};
pub use validation::InputValidator;
