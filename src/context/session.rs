//! In-process override layer.
//!
//! Values prompted for or explicitly saved during this process are kept here
//! and consulted before any context file, so one run never prompts twice for
//! the same key. Nothing in this layer is persisted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Thread-safe key -> value store shared by all resolutions on a `Resolver`.
#[derive(Debug, Default)]
pub struct OverrideLayer {
    values: Mutex<HashMap<String, String>>,
}

impl OverrideLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Set a value. Returns the previous value, if any.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn clear(&self) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Sorted copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
