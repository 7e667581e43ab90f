use keyring::Entry;
use tracing::debug;

use super::{SessionStore, StoreError};
use crate::auth::StorageKey;

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "authkeep";

/// Session store backed by the OS keychain, one entry per storage key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: StorageKey) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key.as_str())?)
    }

    fn delete(&self, key: StorageKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl SessionStore for KeyringStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        // Some keychains reject empty secrets; an empty value reads back as absent anyway.
        if value.is_empty() {
            return self.delete(key);
        }
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        for key in StorageKey::ALL {
            self.delete(key)?;
        }
        debug!(service = %self.service, "Keychain session entries cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_get_without_entries() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringStore::new("authkeep-test");

        store.clear().unwrap();
        assert_eq!(store.get(StorageKey::IdToken).unwrap(), None);
        // Empty values are deleted rather than written
        store.set(StorageKey::RefreshToken, "").unwrap();
    }
}
