//! Key-value store behind all user overlays
//!
//! Values are JSON strings under namespaced keys. `update` is the only
//! read-modify-write entry point: it holds the entry lock for the key while
//! the closure runs, so two toggles on the same key never interleave.

use std::collections::BTreeMap;
use std::path::Path;

use dashmap::DashMap;

use crate::shared::errors::OverlayError;
use crate::shared::logging;

/// Storage contract the overlay operations rely on
pub trait OverlayStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;
    /// Atomically replace the value at `key` with `f(current)`; `None` deletes it
    fn update(&self, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>);
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Cache keys
pub mod keys {
    pub fn marks_key(scope: &str) -> String {
        format!("marks:{}", scope)
    }

    pub fn star_key(scope: &str) -> String {
        format!("stars:{}", scope)
    }

    pub fn rename_key(scope: &str) -> String {
        format!("renames:{}", scope)
    }

    pub fn order_key(scope: &str) -> String {
        format!("order:{}", scope)
    }
}

/// In-memory store, optionally persisted to a JSON file
#[derive(Debug, Default)]
pub struct MemoryOverlayStore {
    entries: DashMap<String, String>,
}

impl MemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store previously written by [`MemoryOverlayStore::save`].
    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, OverlayError> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let content = std::fs::read_to_string(path)?;
        let map: BTreeMap<String, String> = serde_json::from_str(&content)?;
        for (k, v) in map {
            store.entries.insert(k, v);
        }
        Ok(store)
    }

    /// Write all entries as one JSON object (sorted keys)
    pub fn save(&self, path: &Path) -> Result<(), OverlayError> {
        let map: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OverlayStore for MemoryOverlayStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
        logging::log_overlay_write(key);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>) {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match f(Some(occupied.get().as_str())) {
                Some(next) => {
                    occupied.insert(next);
                }
                None => {
                    occupied.remove();
                }
            },
            Entry::Vacant(vacant) => {
                if let Some(next) = f(None) {
                    vacant.insert(next);
                }
            }
        }
        logging::log_overlay_write(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }
}
