//! Per-device capability and settings store.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::{DashMap, DashSet};
use zigbridge_core::Value;

/// Where a normalized value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Capability(&'static str),
    Setting(&'static str),
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capability(name) | Self::Setting(name) => name,
        }
    }
}

/// Outcome of writing a value into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate {
    /// First value ever seen for this key
    First,
    Changed { previous: Value },
    /// Same value as before; no notification is due
    Unchanged,
}

impl StoreUpdate {
    pub fn should_notify(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub fn previous(&self) -> Option<&Value> {
        match self {
            Self::Changed { previous } => Some(previous),
            _ => None,
        }
    }
}

/// Normalized values for one device.
///
/// Sessions write; the host reads concurrently through [`crate::SessionHandle`].
#[derive(Debug, Default)]
pub struct CapabilityStore {
    capabilities: DashMap<String, Value>,
    settings: DashMap<String, Value>,
    /// Capabilities the bound device can provide
    available: DashSet<String>,
    /// DataPoint index that last reported each capability
    last_source: DashMap<String, u8>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_capability(&self, name: &str, value: Value) -> StoreUpdate {
        self.available.insert(name.to_string());
        Self::upsert(&self.capabilities, name, value)
    }

    pub fn set_setting(&self, key: &str, value: Value) -> StoreUpdate {
        Self::upsert(&self.settings, key, value)
    }

    fn upsert(map: &DashMap<String, Value>, key: &str, value: Value) -> StoreUpdate {
        match map.get_mut(key) {
            Some(current) if *current == value => StoreUpdate::Unchanged,
            Some(mut current) => {
                let previous = std::mem::replace(&mut *current, value);
                StoreUpdate::Changed { previous }
            }
            None => {
                map.insert(key.to_string(), value);
                StoreUpdate::First
            }
        }
    }

    pub fn capability(&self, name: &str) -> Option<Value> {
        self.capabilities.get(name).map(|v| v.clone())
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.settings.get(key).map(|v| v.clone())
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.available.contains(name)
    }

    pub fn mark_available(&self, name: &str) {
        self.available.insert(name.to_string());
    }

    pub fn mark_unavailable(&self, name: &str) {
        self.available.remove(name);
    }

    pub fn record_source(&self, capability: &str, dp: u8) {
        self.last_source.insert(capability.to_string(), dp);
    }

    /// DataPoint index that most recently reported `capability`.
    pub fn last_source(&self, capability: &str) -> Option<u8> {
        self.last_source.get(capability).map(|dp| *dp)
    }

    pub fn available(&self) -> BTreeSet<String> {
        self.available.iter().map(|c| c.key().clone()).collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.capabilities
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn settings_snapshot(&self) -> BTreeMap<String, Value> {
        self.settings
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.capabilities.clear();
        self.settings.clear();
        self.available.clear();
        self.last_source.clear();
    }
}
