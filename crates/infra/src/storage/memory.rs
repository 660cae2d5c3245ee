//! In-process store for tests and ephemeral sessions

use std::collections::HashMap;
use std::sync::Arc;

use courier_domain::Result;
use parking_lot::Mutex;

use super::PersistentStore;

/// [`PersistentStore`] that lives as long as the process.
///
/// Clones share the same data, so a test can keep a handle and inspect
/// what the client persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one record
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.data.lock().insert(key.into(), value.into());
        store
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }
}
