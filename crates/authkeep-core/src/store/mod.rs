//! Session persistence backends.
//!
//! This module provides:
//! - `SessionStore`: the key-value capability the session manager writes through
//! - `MemoryStore`: process-local store for tests and ephemeral sessions
//! - `KeyringStore`: one OS keychain entry per storage key
//! - `FileStore`: a single encrypted JSON file on disk
//!
//! Every operation is synchronous and commits immediately; there is no
//! transaction spanning several keys.

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

pub use error::StoreError;
pub use file::{FileStore, StoreSecret};
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

use crate::auth::StorageKey;

/// Key-value persistence for session tokens.
pub trait SessionStore: Send + Sync {
    /// Read a value, `None` if the key was never written or has been cleared.
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;

    /// Remove every session key. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), StoreError>;
}
