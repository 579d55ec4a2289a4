//! Pluggable feature modules.
//!
//! A module owns one feature's state under its own `module.<name>` storage
//! scope and follows the controller lifecycle. It reaches the controller
//! through a weak handle and must not assume it can always be upgraded.

pub mod address_book;

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::api::NetworkApi;
use crate::controller::WalletController;
use crate::errors::{ControllerErrorCode, WalletError, WalletResult};
use crate::storage::StorageRepository;

pub use address_book::{AddressBook, Contact, ContactParams};

#[async_trait]
pub trait WalletModule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn load_cache(&self) -> WalletResult<()>;

    /// Drop in-memory state only.
    fn reset_state(&self);

    /// Drop persisted and in-memory state.
    async fn clear(&self) -> WalletResult<()>;

    fn as_any(&self) -> &dyn Any;
}

/// What a module factory gets to build its module with.
#[derive(Clone)]
pub struct ModuleContext {
    pub controller: Weak<WalletController>,
    /// For modules that query the chain themselves. The address book is
    /// storage-only and leaves it unused.
    pub network_api: NetworkApi,
    /// Unscoped; see [`ModuleContext::scoped_storage`].
    pub persistent_storage: StorageRepository,
}

impl ModuleContext {
    pub fn scoped_storage(&self, module_name: &str) -> StorageRepository {
        self.persistent_storage
            .create_scope(&format!("module.{}", module_name))
    }
}

pub type ModuleFactory = Box<dyn FnOnce(&ModuleContext) -> Arc<dyn WalletModule> + Send>;

pub(crate) fn upgrade_controller(
    controller: &Weak<WalletController>,
) -> WalletResult<Arc<WalletController>> {
    controller.upgrade().ok_or_else(|| {
        WalletError::controller(
            ControllerErrorCode::MissingCapability,
            "Wallet controller is no longer available",
        )
    })
}
