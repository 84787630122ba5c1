//! Peripherals known to a hub.
//!
//! Each peripheral registers under its unique label with the token that
//! addresses it on the controller (an ASI card address, a Prior device id).
//! Peripherals sharing a token share controller settings, which is what
//! [`DeviceRegistry::labels_with`] is for.

use std::collections::BTreeMap;

/// Label to address token map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry<K> {
    devices: BTreeMap<String, K>,
}

impl<K> Default for DeviceRegistry<K> {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }
}

impl<K: Clone + PartialEq> DeviceRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `label`. A label registered again gets the new token, and the
    /// old one is returned.
    pub fn register(&mut self, label: impl Into<String>, token: K) -> Option<K> {
        self.devices.insert(label.into(), token)
    }

    pub fn unregister(&mut self, label: &str) -> Option<K> {
        self.devices.remove(label)
    }

    pub fn is_registered(&self, label: &str) -> bool {
        self.devices.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<&K> {
        self.devices.get(label)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Labels registered with `token`, in label order.
    pub fn labels_with(&self, token: &K) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(_, t)| *t == token)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &K)> + '_ {
        self.devices.iter().map(|(label, t)| (label.as_str(), t))
    }
}
