//! Encrypted single-file session store.
//!
//! The file holds a JSON envelope whose ciphertext is the ChaCha20-Poly1305
//! encryption of a JSON map from storage key to value. The cipher key is
//! derived with Argon2id from a secret and the per-file salt. The secret is
//! either a caller-supplied passphrase or a random value kept in the OS
//! keychain.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keyring::Entry;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SessionStore, StoreError};
use crate::auth::StorageKey;

/// Default store file name in the data directory
pub const STORE_FILE: &str = "session.json";

/// Envelope format version
const STORE_VERSION: u8 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Keychain account holding the generated store secret
const SECRET_ACCOUNT: &str = "session-store-secret";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// Source of the secret the file key is derived from.
#[derive(Clone)]
pub enum StoreSecret {
    Passphrase(String),
    /// Random secret generated on first use and kept in the OS keychain
    /// under this service name.
    Keychain { service: String },
}

impl std::fmt::Debug for StoreSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSecret::Passphrase(_) => f.write_str("Passphrase(..)"),
            StoreSecret::Keychain { service } => {
                f.debug_struct("Keychain").field("service", service).finish()
            }
        }
    }
}

impl StoreSecret {
    fn material(&self) -> Result<Vec<u8>, StoreError> {
        match self {
            StoreSecret::Passphrase(passphrase) => Ok(passphrase.as_bytes().to_vec()),
            StoreSecret::Keychain { service } => {
                let entry = Entry::new(service, SECRET_ACCOUNT)?;
                match entry.get_password() {
                    Ok(secret) => Ok(secret.into_bytes()),
                    Err(keyring::Error::NoEntry) => {
                        let mut raw = [0u8; KEY_LEN];
                        rand::thread_rng().fill_bytes(&mut raw);
                        let secret = STANDARD.encode(raw);
                        entry.set_password(&secret)?;
                        debug!(%service, "Generated new session store secret");
                        Ok(secret.into_bytes())
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

struct DerivedKey {
    salt: Vec<u8>,
    key: [u8; KEY_LEN],
}

pub struct FileStore {
    path: PathBuf,
    secret: StoreSecret,
    derived: Mutex<Option<DerivedKey>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, secret: StoreSecret) -> Self {
        Self {
            path: path.into(),
            secret,
            derived: Mutex::new(None),
        }
    }

    /// Store file `session.json` inside `dir`
    pub fn in_dir(dir: &Path, secret: StoreSecret) -> Self {
        Self::new(dir.join(STORE_FILE), secret)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Derive (or reuse) the cipher key for a salt.
    fn key_for(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], StoreError> {
        let mut derived = self.derived.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(ref cached) = *derived {
            if cached.salt == salt {
                return Ok(cached.key);
            }
        }

        let material = self.secret.material()?;
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(&material, salt, &mut key)
            .map_err(|e| StoreError::Crypto(format!("key derivation failed: {}", e)))?;

        *derived = Some(DerivedKey {
            salt: salt.to_vec(),
            key,
        });
        Ok(key)
    }

    fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, StoreError> {
        STANDARD
            .decode(value)
            .map_err(|e| StoreError::Crypto(format!("invalid {} encoding: {}", name, e)))
    }

    /// Load and decrypt the stored map together with its salt.
    /// A missing file is an empty store.
    fn load(&self) -> Result<Option<(BTreeMap<String, String>, Vec<u8>)>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let envelope: Envelope = serde_json::from_str(&contents)?;
        if envelope.version != STORE_VERSION {
            return Err(StoreError::Crypto(format!(
                "unsupported store version {}",
                envelope.version
            )));
        }

        let salt = Self::decode_field("salt", &envelope.salt)?;
        let nonce = Self::decode_field("nonce", &envelope.nonce)?;
        let ciphertext = Self::decode_field("ciphertext", &envelope.ciphertext)?;
        if nonce.len() != NONCE_LEN {
            return Err(StoreError::Crypto("invalid nonce length".to_string()));
        }

        let key = self.key_for(&salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| {
                StoreError::Crypto("failed to decrypt store (wrong secret or corrupted file)".to_string())
            })?;

        let map = serde_json::from_slice(&plaintext)?;
        Ok(Some((map, salt)))
    }

    fn save(&self, map: &BTreeMap<String, String>, salt: &[u8]) -> Result<(), StoreError> {
        let key = self.key_for(salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let plaintext = serde_json::to_vec(map)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| StoreError::Crypto("failed to encrypt store".to_string()))?;

        let envelope = Envelope {
            version: STORE_VERSION,
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(&envelope)?)?;
        restrict_permissions(&tmp_path);
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, path = %path.display(), "Failed to restrict store file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl SessionStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self
            .load()?
            .and_then(|(mut map, _)| map.remove(key.as_str())))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        let (mut map, salt) = match self.load()? {
            Some(loaded) => loaded,
            None => {
                let mut salt = vec![0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                (BTreeMap::new(), salt)
            }
        };
        map.insert(key.as_str().to_string(), value.to_string());
        self.save(&map, &salt)
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), "Session store file removed");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
