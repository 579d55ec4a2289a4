use std::collections::BTreeMap;

use crate::account::WalletAccount;
use crate::api::types::{AccountInfo, NetworkConnectionStatus, NetworkProperties, TransactionRecord};
use crate::network_map::NetworkMap;

/// Everything the controller knows. Replaced wholesale on load, reset and
/// clear; mutated slice by slice otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub is_cache_loaded: bool,
    pub network_identifier: String,
    pub network_properties: Option<NetworkProperties>,
    pub network_status: NetworkConnectionStatus,
    pub node_urls: NetworkMap<Vec<String>>,
    pub selected_node_url: Option<String>,
    pub wallet_accounts: NetworkMap<Vec<WalletAccount>>,
    /// Keyed by public key.
    pub account_infos: NetworkMap<BTreeMap<String, AccountInfo>>,
    pub current_account_public_key: Option<String>,
    pub seed_addresses: NetworkMap<Vec<WalletAccount>>,
    /// First confirmed page per account, keyed by public key.
    pub latest_transactions: NetworkMap<BTreeMap<String, Vec<TransactionRecord>>>,
}

impl ControllerState {
    pub fn initial(networks: &[String], network_identifier: &str) -> Self {
        Self {
            is_cache_loaded: false,
            network_identifier: network_identifier.to_string(),
            network_properties: None,
            network_status: NetworkConnectionStatus::Initial,
            node_urls: NetworkMap::with_defaults(networks),
            selected_node_url: None,
            wallet_accounts: NetworkMap::with_defaults(networks),
            account_infos: NetworkMap::with_defaults(networks),
            current_account_public_key: None,
            seed_addresses: NetworkMap::with_defaults(networks),
            latest_transactions: NetworkMap::with_defaults(networks),
        }
    }

    /// Accounts of the active network.
    pub fn accounts(&self) -> &[WalletAccount] {
        self.wallet_accounts
            .get(&self.network_identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The selected account, if it still exists on the active network.
    pub fn current_account(&self) -> Option<WalletAccount> {
        let public_key = self.current_account_public_key.as_deref()?;
        self.accounts()
            .iter()
            .find(|account| account.public_key == public_key)
            .cloned()
    }

    pub fn current_account_info(&self) -> Option<AccountInfo> {
        let public_key = self.current_account_public_key.as_deref()?;
        self.account_infos
            .get(&self.network_identifier)
            .and_then(|infos| infos.get(public_key))
            .cloned()
    }

    pub fn current_latest_transactions(&self) -> Vec<TransactionRecord> {
        let Some(public_key) = self.current_account_public_key.as_deref() else {
            return Vec::new();
        };
        self.latest_transactions
            .get(&self.network_identifier)
            .and_then(|transactions| transactions.get(public_key))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;

    #[test]
    fn dangling_selection_resolves_to_none() {
        let networks = vec!["mainnet".to_string(), "testnet".to_string()];
        let mut state = ControllerState::initial(&networks, "testnet");
        state.wallet_accounts.entry("testnet").push(WalletAccount {
            address: "TA".into(),
            public_key: "PK1".into(),
            name: "One".into(),
            network_identifier: "testnet".into(),
            account_type: AccountType::External,
            index: None,
        });

        state.current_account_public_key = Some("PK1".into());
        assert_eq!(state.current_account().map(|a| a.name), Some("One".to_string()));

        state.current_account_public_key = Some("GONE".into());
        assert!(state.current_account().is_none());
        assert_eq!(state.current_account_public_key.as_deref(), Some("GONE"));
    }
}
