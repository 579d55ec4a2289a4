use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{upgrade_controller, ModuleContext, ModuleFactory, WalletModule};
use crate::controller::WalletController;
use crate::errors::{WalletError, WalletResult};
use crate::network_map::NetworkMap;
use crate::storage::StorageRepository;
use crate::validation::InputValidator;

const CONTACTS_KEY: &str = "contacts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContactParams {
    pub name: String,
    pub address: String,
    pub notes: String,
    pub is_blocked: bool,
}

/// Contacts per network. Every operation works on the active network.
pub struct AddressBook {
    controller: Weak<WalletController>,
    storage: StorageRepository,
    contacts: RwLock<NetworkMap<Vec<Contact>>>,
}

impl AddressBook {
    pub const NAME: &'static str = "address-book";

    pub fn new(ctx: &ModuleContext) -> Self {
        Self {
            controller: ctx.controller.clone(),
            storage: ctx.scoped_storage(Self::NAME),
            contacts: RwLock::new(NetworkMap::default()),
        }
    }

    pub fn factory() -> ModuleFactory {
        Box::new(|ctx: &ModuleContext| Arc::new(AddressBook::new(ctx)) as Arc<dyn WalletModule>)
    }

    /// Contacts of the active network.
    pub fn contacts(&self) -> WalletResult<Vec<Contact>> {
        let network_identifier = self.active_network()?;
        Ok(self
            .contacts
            .read()
            .get(&network_identifier)
            .cloned()
            .unwrap_or_default())
    }

    pub fn blocked_contacts(&self) -> WalletResult<Vec<Contact>> {
        Ok(self
            .contacts()?
            .into_iter()
            .filter(|contact| contact.is_blocked)
            .collect())
    }

    pub fn find_by_address(&self, address: &str) -> WalletResult<Option<Contact>> {
        Ok(self
            .contacts()?
            .into_iter()
            .find(|contact| contact.address.eq_ignore_ascii_case(address)))
    }

    pub async fn add_contact(&self, params: ContactParams) -> WalletResult<Contact> {
        validate(&params)?;
        let network_identifier = self.active_network()?;

        let mut contacts = self.reload().await?;
        let list = contacts.entry(&network_identifier);
        if list
            .iter()
            .any(|contact| contact.address.eq_ignore_ascii_case(&params.address))
        {
            return Err(WalletError::ValidationError(format!(
                "Address {} is already in the address book",
                params.address
            )));
        }
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            name: params.name,
            address: params.address,
            notes: params.notes,
            is_blocked: params.is_blocked,
        };
        list.push(contact.clone());

        self.persist(contacts).await?;
        Ok(contact)
    }

    pub async fn update_contact(&self, id: &str, params: ContactParams) -> WalletResult<Contact> {
        validate(&params)?;
        let network_identifier = self.active_network()?;

        let mut contacts = self.reload().await?;
        let list = contacts.entry(&network_identifier);
        if list.iter().any(|contact| {
            contact.id != id && contact.address.eq_ignore_ascii_case(&params.address)
        }) {
            return Err(WalletError::ValidationError(format!(
                "Address {} is already in the address book",
                params.address
            )));
        }
        let contact = list
            .iter_mut()
            .find(|contact| contact.id == id)
            .ok_or_else(|| contact_missing(id))?;
        contact.name = params.name;
        contact.address = params.address;
        contact.notes = params.notes;
        contact.is_blocked = params.is_blocked;
        let updated = contact.clone();

        self.persist(contacts).await?;
        Ok(updated)
    }

    pub async fn remove_contact(&self, id: &str) -> WalletResult<()> {
        let network_identifier = self.active_network()?;

        let mut contacts = self.reload().await?;
        let list = contacts.entry(&network_identifier);
        let position = list
            .iter()
            .position(|contact| contact.id == id)
            .ok_or_else(|| contact_missing(id))?;
        list.remove(position);

        self.persist(contacts).await
    }

    fn active_network(&self) -> WalletResult<String> {
        Ok(upgrade_controller(&self.controller)?.network_identifier())
    }

    async fn reload(&self) -> WalletResult<NetworkMap<Vec<Contact>>> {
        let networks = upgrade_controller(&self.controller)?.networks().to_vec();
        let persisted = self.storage.get(CONTACTS_KEY).await?;
        Ok(NetworkMap::restore(persisted, &networks))
    }

    async fn persist(&self, contacts: NetworkMap<Vec<Contact>>) -> WalletResult<()> {
        self.storage.set(CONTACTS_KEY, &contacts).await?;
        *self.contacts.write() = contacts;
        Ok(())
    }
}

fn validate(params: &ContactParams) -> WalletResult<()> {
    InputValidator::validate_account_name(&params.name)?;
    if params.address.trim().is_empty() {
        return Err(WalletError::ValidationError(
            "Contact address cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn contact_missing(id: &str) -> WalletError {
    WalletError::ValidationError(format!("Contact {} does not exist", id))
}

#[async_trait]
impl WalletModule for AddressBook {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn load_cache(&self) -> WalletResult<()> {
        let contacts = self.reload().await?;
        *self.contacts.write() = contacts;
        Ok(())
    }

    fn reset_state(&self) {
        *self.contacts.write() = NetworkMap::default();
    }

    async fn clear(&self) -> WalletResult<()> {
        self.storage.remove(CONTACTS_KEY).await?;
        self.reset_state();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
