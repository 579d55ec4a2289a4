use secrecy::SecretString;

use super::{keystore_missing, WalletController};
use crate::account::{position_of, AccountType, WalletAccount};
use crate::api::types::{AccountInfo, TransactionQuery, TransactionRecord};
use crate::errors::{ControllerErrorCode, KeystoreErrorCode, WalletError, WalletResult};
use crate::events::ControllerEvent;
use crate::network_map::NetworkMap;
use crate::validation::InputValidator;

#[derive(Debug, Clone)]
pub struct MnemonicWalletParams {
    pub mnemonic: SecretString,
    /// Name given to the first account of every network.
    pub name: String,
    pub account_per_network_count: u32,
}

#[derive(Debug, Clone)]
pub struct SeedAccountParams {
    pub name: String,
    pub network_identifier: String,
    pub index: u32,
    pub account_type: AccountType,
}

#[derive(Debug, Clone)]
pub struct ExternalAccountParams {
    pub private_key: SecretString,
    pub name: String,
    pub network_identifier: String,
}

#[derive(Debug, Clone)]
pub struct HardwareAccountParams {
    pub name: String,
    pub network_identifier: String,
    pub index: u32,
}

impl WalletController {
    /// Make `public_key` the active account of the active network.
    pub async fn select_account(&self, public_key: &str) -> WalletResult<()> {
        let account = self
            .state
            .read()
            .accounts()
            .iter()
            .find(|account| account.public_key == public_key)
            .cloned()
            .ok_or_else(|| {
                WalletError::controller(
                    ControllerErrorCode::SelectedAccountMissing,
                    format!("Account {} does not exist on the active network", public_key),
                )
            })?;

        self.storage
            .set_current_account_public_key(Some(&account.public_key))
            .await?;
        self.state.write().current_account_public_key = Some(account.public_key.clone());
        self.emit_change(ControllerEvent::AccountChanged(Some(account.clone())));

        self.network_manager
            .set_listen_address(Some(account.address))
            .await;
        Ok(())
    }

    /// Create a mnemonic wallet, replacing every existing account list.
    ///
    /// Only the first derived account per network becomes a wallet account;
    /// the full derived set is kept as seed addresses.
    pub async fn save_mnemonic_and_generate_accounts(
        &self,
        params: MnemonicWalletParams,
        password: Option<&SecretString>,
    ) -> WalletResult<()> {
        InputValidator::validate_account_name(&params.name)?;
        let keystore = self
            .mnemonic_keystore()
            .ok_or_else(|| keystore_missing(AccountType::Mnemonic))?;

        let derived = keystore
            .create_wallet(&params.mnemonic, params.account_per_network_count, password)
            .await?;

        let mut wallet_accounts = NetworkMap::with_defaults(&self.networks);
        let mut seed_addresses = NetworkMap::with_defaults(&self.networks);
        for network in &self.networks {
            let derived_accounts = derived.get(network).cloned().unwrap_or_default();
            if let Some(first) = derived_accounts.first() {
                wallet_accounts.insert(network.clone(), vec![first.clone().with_name(&params.name)]);
            }
            seed_addresses.insert(network.clone(), derived_accounts);
        }

        self.storage.set_accounts(&wallet_accounts).await?;
        self.storage.set_seed_addresses(&seed_addresses).await?;
        {
            let mut state = self.state.write();
            state.wallet_accounts = wallet_accounts;
            state.seed_addresses = seed_addresses;
        }
        log::info!("Mnemonic wallet created");
        self.emit_change(ControllerEvent::WalletCreated);

        let first_account = self.state.read().accounts().first().cloned();
        if let Some(account) = first_account {
            self.select_account(&account.public_key).await?;
        }
        Ok(())
    }

    /// Add a derived account by index. Hardware types are paired through
    /// the hardware keystore.
    pub async fn add_seed_account(&self, params: SeedAccountParams) -> WalletResult<WalletAccount> {
        InputValidator::validate_account_name(&params.name)?;
        self.ensure_supported_network(&params.network_identifier)?;

        match params.account_type {
            AccountType::Mnemonic => {
                let keystore = self
                    .mnemonic_keystore()
                    .ok_or_else(|| keystore_missing(AccountType::Mnemonic))?;
                let account = keystore
                    .get_seed_account(&params.network_identifier, params.index)?
                    .with_name(&params.name);
                self.add_account(account).await
            }
            AccountType::Hardware => {
                self.add_hardware_account(HardwareAccountParams {
                    name: params.name,
                    network_identifier: params.network_identifier,
                    index: params.index,
                })
                .await
            }
            AccountType::External => Err(WalletError::ValidationError(
                "External accounts are added from a private key".to_string(),
            )),
        }
    }

    pub async fn add_external_account(
        &self,
        params: ExternalAccountParams,
        password: Option<&SecretString>,
    ) -> WalletResult<WalletAccount> {
        use secrecy::ExposeSecret;

        InputValidator::validate_account_name(&params.name)?;
        InputValidator::validate_private_key(params.private_key.expose_secret())?;
        self.ensure_supported_network(&params.network_identifier)?;
        let keystore = self
            .external_keystore()
            .ok_or_else(|| keystore_missing(AccountType::External))?;

        // Refuse duplicates before the key reaches the keystore.
        let candidate = self
            .sdk
            .create_private_account(
                params.private_key.expose_secret(),
                &params.name,
                &params.network_identifier,
                AccountType::External,
                None,
            )?
            .to_public();
        let persisted = self.persisted_accounts().await?;
        if Self::contains_account(&persisted, &candidate) {
            return Err(already_exists(&candidate));
        }

        let account = keystore
            .add_account(
                params.private_key.expose_secret(),
                &params.network_identifier,
                &params.name,
                password,
            )
            .await?;
        match self.add_account(account.clone()).await {
            Ok(account) => Ok(account),
            Err(err) => {
                if let Err(rollback) = keystore.remove_account(&account, password).await {
                    log::error!(
                        "Imported key {} left in keystore after failed add: {}",
                        account.address,
                        rollback
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn add_hardware_account(
        &self,
        params: HardwareAccountParams,
    ) -> WalletResult<WalletAccount> {
        InputValidator::validate_account_name(&params.name)?;
        self.ensure_supported_network(&params.network_identifier)?;
        let keystore = self
            .hardware_keystore()
            .ok_or_else(|| keystore_missing(AccountType::Hardware))?;

        let account = keystore
            .add_account(&params.network_identifier, params.index, &params.name)
            .await?;
        match self.add_account(account.clone()).await {
            Ok(account) => Ok(account),
            Err(err) => {
                if let Err(rollback) = keystore.remove_account(&account).await {
                    log::error!(
                        "Hardware account {} left paired after failed add: {}",
                        account.address,
                        rollback
                    );
                }
                Err(err)
            }
        }
    }

    /// Shared append path. Works on the persisted list, not the in-memory one.
    async fn add_account(&self, account: WalletAccount) -> WalletResult<WalletAccount> {
        let mut accounts = self.persisted_accounts().await?;
        if Self::contains_account(&accounts, &account) {
            return Err(already_exists(&account));
        }
        accounts
            .entry(&account.network_identifier)
            .push(account.clone());

        self.commit_accounts(accounts).await?;
        log::info!(
            "Added {} account {} on {}",
            account.account_type,
            account.address,
            account.network_identifier
        );
        self.emit(ControllerEvent::StateChanged);
        Ok(account)
    }

    pub async fn rename_account(
        &self,
        network_identifier: &str,
        public_key: &str,
        name: &str,
    ) -> WalletResult<()> {
        InputValidator::validate_account_name(name)?;
        self.ensure_supported_network(network_identifier)?;

        let mut accounts = self.persisted_accounts().await?;
        let list = accounts.entry(network_identifier);
        let position = position_of(list, public_key)
            .ok_or_else(|| account_missing(network_identifier, public_key))?;
        list[position].name = name.to_string();
        let renamed = list[position].clone();

        self.commit_accounts(accounts).await?;

        let is_current = {
            let state = self.state.read();
            state.network_identifier == network_identifier
                && state.current_account_public_key.as_deref() == Some(public_key)
        };
        if is_current {
            self.emit(ControllerEvent::AccountChanged(Some(renamed)));
        }
        self.emit(ControllerEvent::StateChanged);
        Ok(())
    }

    /// Remove an account and its cached data. Imported and paired accounts
    /// are dropped from their keystore first.
    pub async fn remove_account(
        &self,
        network_identifier: &str,
        public_key: &str,
        password: Option<&SecretString>,
    ) -> WalletResult<()> {
        self.ensure_supported_network(network_identifier)?;
        let is_current = {
            let state = self.state.read();
            state.network_identifier == network_identifier
                && state.current_account_public_key.as_deref() == Some(public_key)
        };
        if is_current {
            return Err(WalletError::controller(
                ControllerErrorCode::RemoveSelectedAccount,
                "The selected account cannot be removed",
            ));
        }

        let mut accounts = self.persisted_accounts().await?;
        let list = accounts.entry(network_identifier);
        let position = position_of(list, public_key)
            .ok_or_else(|| account_missing(network_identifier, public_key))?;
        let account = list[position].clone();

        match account.account_type {
            AccountType::External => {
                let removed = self
                    .external_keystore()
                    .ok_or_else(|| keystore_missing(AccountType::External))?
                    .remove_account(&account, password)
                    .await;
                match removed {
                    Err(err) if err.is_keystore(KeystoreErrorCode::AccountMissing) => {
                        log::warn!("Key for {} was already gone from the keystore", account.address);
                    }
                    other => other?,
                }
            }
            AccountType::Hardware => {
                self.hardware_keystore()
                    .ok_or_else(|| keystore_missing(AccountType::Hardware))?
                    .remove_account(&account)
                    .await?;
            }
            AccountType::Mnemonic => {}
        }
        accounts.entry(network_identifier).remove(position);

        let (mut account_infos, mut latest_transactions) = {
            let state = self.state.read();
            (state.account_infos.clone(), state.latest_transactions.clone())
        };
        account_infos.entry(network_identifier).remove(public_key);
        latest_transactions.entry(network_identifier).remove(public_key);

        self.storage.set_account_infos(&account_infos).await?;
        self.storage.set_latest_transactions(&latest_transactions).await?;
        self.commit_accounts(accounts).await?;
        {
            let mut state = self.state.write();
            state.account_infos = account_infos;
            state.latest_transactions = latest_transactions;
        }
        log::info!("Removed account {} from {}", account.address, network_identifier);
        self.emit(ControllerEvent::StateChanged);
        Ok(())
    }

    /// Reorder a network's accounts. Keys not listed keep their relative
    /// order after the listed ones; unknown keys are ignored.
    pub async fn change_accounts_order(
        &self,
        network_identifier: &str,
        ordered_public_keys: &[String],
    ) -> WalletResult<()> {
        self.ensure_supported_network(network_identifier)?;

        let mut accounts = self.persisted_accounts().await?;
        let list = accounts.entry(network_identifier);
        let mut remaining = std::mem::take(list);
        for public_key in ordered_public_keys {
            if let Some(position) = position_of(&remaining, public_key) {
                list.push(remaining.remove(position));
            }
        }
        list.append(&mut remaining);

        self.commit_accounts(accounts).await?;
        self.emit(ControllerEvent::StateChanged);
        Ok(())
    }

    pub async fn get_mnemonic(&self, password: Option<&SecretString>) -> WalletResult<SecretString> {
        self.mnemonic_keystore()
            .ok_or_else(|| keystore_missing(AccountType::Mnemonic))?
            .get_mnemonic(password)
            .await
    }

    /// Refresh the active account's info and cache it.
    pub async fn fetch_account_info(&self) -> WalletResult<AccountInfo> {
        let account = self.require_current_account()?;
        let properties = self.require_network_properties()?;
        let info = self
            .network_api
            .account
            .fetch_account_info(&properties, &account.address)
            .await?;

        if !self.is_active_network(&account.network_identifier) {
            log::debug!("Dropping account info fetched for an inactive network");
            return Ok(info);
        }
        let mut account_infos = self.state.read().account_infos.clone();
        account_infos
            .entry(&account.network_identifier)
            .insert(account.public_key.clone(), info.clone());
        self.storage.set_account_infos(&account_infos).await?;
        self.state.write().account_infos = account_infos;

        self.emit_change(ControllerEvent::AccountInfoChanged {
            public_key: account.public_key,
            info: info.clone(),
        });
        Ok(info)
    }

    /// Page through the active account's transactions. Only the default
    /// query refreshes the latest-transactions cache.
    pub async fn fetch_account_transactions(
        &self,
        query: &TransactionQuery,
    ) -> WalletResult<Vec<TransactionRecord>> {
        let account = self.require_current_account()?;
        let properties = self.require_network_properties()?;
        let transactions = self
            .network_api
            .transaction
            .fetch_account_transactions(&properties, &account, query)
            .await?;

        if !query.is_default() || !self.is_active_network(&account.network_identifier) {
            return Ok(transactions);
        }
        let mut latest_transactions = self.state.read().latest_transactions.clone();
        latest_transactions
            .entry(&account.network_identifier)
            .insert(account.public_key.clone(), transactions.clone());
        self.storage
            .set_latest_transactions(&latest_transactions)
            .await?;
        self.state.write().latest_transactions = latest_transactions;
        self.emit(ControllerEvent::StateChanged);
        Ok(transactions)
    }

    async fn persisted_accounts(&self) -> WalletResult<NetworkMap<Vec<WalletAccount>>> {
        let persisted = self.storage.accounts().await?;
        Ok(NetworkMap::restore(persisted, &self.networks))
    }

    async fn commit_accounts(&self, accounts: NetworkMap<Vec<WalletAccount>>) -> WalletResult<()> {
        self.storage.set_accounts(&accounts).await?;
        self.state.write().wallet_accounts = accounts;
        Ok(())
    }

    fn contains_account(accounts: &NetworkMap<Vec<WalletAccount>>, account: &WalletAccount) -> bool {
        accounts
            .get(&account.network_identifier)
            .map_or(false, |list| position_of(list, &account.public_key).is_some())
    }

    pub(super) fn require_current_account(&self) -> WalletResult<WalletAccount> {
        self.state.read().current_account().ok_or_else(|| {
            WalletError::controller(
                ControllerErrorCode::SelectedAccountMissing,
                "No account is selected",
            )
        })
    }
}

fn already_exists(account: &WalletAccount) -> WalletError {
    WalletError::controller(
        ControllerErrorCode::AccountAlreadyExists,
        format!(
            "Account {} already exists on {}",
            account.address, account.network_identifier
        ),
    )
}

fn account_missing(network_identifier: &str, public_key: &str) -> WalletError {
    WalletError::controller(
        ControllerErrorCode::AccountMissing,
        format!("Account {} does not exist on {}", public_key, network_identifier),
    )
}
