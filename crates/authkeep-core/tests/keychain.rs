//! Round trips through the platform keychain. Runs in its own process so the
//! mock credential builder installed by the unit tests does not apply.

use authkeep_core::{KeyringStore, SessionStore, StorageKey};

#[test]
#[ignore = "needs a platform keychain"]
fn test_keyring_store_persists_across_instances() {
    let service = format!("authkeep-test-{}", std::process::id());
    let store = KeyringStore::new(service.clone());
    store.set(StorageKey::AccessToken, "abc").unwrap();

    let reopened = KeyringStore::new(service);
    assert_eq!(
        reopened.get(StorageKey::AccessToken).unwrap().as_deref(),
        Some("abc")
    );

    reopened.clear().unwrap();
    assert_eq!(store.get(StorageKey::AccessToken).unwrap(), None);
}
