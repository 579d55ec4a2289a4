use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Total mapping from every configured network identifier to a value.
///
/// Persisted maps may be partial (a network added in a later release, a
/// slice written before a network existed); [`NetworkMap::backfill`] fills
/// the gaps so callers never observe a missing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkMap<T> {
    entries: BTreeMap<String, T>,
}

impl<T> NetworkMap<T> {
    pub fn from_networks<F>(networks: &[String], mut init: F) -> Self
    where
        F: FnMut(&str) -> T,
    {
        let entries = networks
            .iter()
            .map(|network| (network.clone(), init(network)))
            .collect();
        Self { entries }
    }

    /// Insert a default for every configured network that has no entry.
    pub fn backfill<F>(&mut self, networks: &[String], mut init: F)
    where
        F: FnMut(&str) -> T,
    {
        for network in networks {
            if !self.entries.contains_key(network) {
                self.entries.insert(network.clone(), init(network));
            }
        }
    }

    pub fn get(&self, network_identifier: &str) -> Option<&T> {
        self.entries.get(network_identifier)
    }

    pub fn get_mut(&mut self, network_identifier: &str) -> Option<&mut T> {
        self.entries.get_mut(network_identifier)
    }

    pub fn insert(&mut self, network_identifier: impl Into<String>, value: T) -> Option<T> {
        self.entries.insert(network_identifier.into(), value)
    }

    pub fn contains(&self, network_identifier: &str) -> bool {
        self.entries.contains_key(network_identifier)
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map<U, F>(&self, mut f: F) -> NetworkMap<U>
    where
        F: FnMut(&str, &T) -> U,
    {
        NetworkMap {
            entries: self
                .entries
                .iter()
                .map(|(network, value)| (network.clone(), f(network, value)))
                .collect(),
        }
    }
}

impl<T: Default> NetworkMap<T> {
    pub fn with_defaults(networks: &[String]) -> Self {
        Self::from_networks(networks, |_| T::default())
    }

    /// Entry for a network, inserting the default when it is missing.
    pub fn entry(&mut self, network_identifier: &str) -> &mut T {
        self.entries
            .entry(network_identifier.to_string())
            .or_default()
    }

    /// Restore a persisted map: drop nothing, fill every configured gap.
    pub fn restore(persisted: Option<Self>, networks: &[String]) -> Self {
        let mut map = persisted.unwrap_or_else(|| Self {
            entries: BTreeMap::new(),
        });
        map.backfill(networks, |_| T::default());
        map
    }
}

impl<T> Default for NetworkMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn networks() -> Vec<String> {
        vec!["mainnet".to_string(), "testnet".to_string()]
    }

    #[test]
    fn restore_backfills_missing_networks() {
        let mut persisted: NetworkMap<Vec<u32>> = NetworkMap::default();
        persisted.insert("testnet", vec![7]);

        let restored = NetworkMap::restore(Some(persisted), &networks());
        assert_eq!(restored.get("mainnet"), Some(&Vec::new()));
        assert_eq!(restored.get("testnet"), Some(&vec![7]));
    }

    #[test]
    fn serializes_as_plain_object() {
        let map: NetworkMap<Vec<u32>> = NetworkMap::with_defaults(&networks());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"mainnet":[],"testnet":[]}"#);
    }
}
