use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{SessionStore, StoreError};
use crate::auth::StorageKey;

/// Process-local session store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored
    pub fn snapshot(&self) -> BTreeMap<StorageKey, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.get(StorageKey::AccessToken).unwrap(), None);

        store.set(StorageKey::AccessToken, "abc").unwrap();
        store.set(StorageKey::AccessToken, "def").unwrap();
        assert_eq!(store.get(StorageKey::AccessToken).unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());
        // Clearing twice is fine
        store.clear().unwrap();
    }
}
