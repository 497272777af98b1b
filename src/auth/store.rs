//! Refresh-token persistence.
//!
//! The refresh token is the only credential that outlives a process. It is
//! kept in the platform's secret store:
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - Windows: Credential Manager

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::models::ServiceKey;
use crate::{Error, Result};

/// Account name of the refresh-token entry under a service key.
const REFRESH_TOKEN_ACCOUNT: &str = "refresh_token";

/// Storage for the long-lived refresh token.
///
/// Implementations must keep the value confidential at rest and replace it
/// atomically on `store`. Callers serialize writes; implementations need no
/// further coordination. Errors must never include the token value.
pub trait CredentialStore: Send + Sync {
    /// Persist `refresh_token` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the backend cannot be written.
    fn store(&self, key: &ServiceKey, refresh_token: &SecretString) -> Result<()>;

    /// Load the refresh token stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the backend cannot be read.
    fn load(&self, key: &ServiceKey) -> Result<Option<SecretString>>;
}

/// Credential store backed by the operating system keyring.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    /// Create a keyring-backed store.
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &ServiceKey) -> Result<Entry> {
        Entry::new(key.as_str(), REFRESH_TOKEN_ACCOUNT).map_err(keyring_error)
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, key: &ServiceKey, refresh_token: &SecretString) -> Result<()> {
        Self::entry(key)?
            .set_password(refresh_token.expose_secret())
            .map_err(keyring_error)?;
        debug!(service = %key, "stored refresh token in keyring");
        Ok(())
    }

    fn load(&self, key: &ServiceKey) -> Result<Option<SecretString>> {
        match Self::entry(key)?.get_password() {
            Ok(value) if !value.trim().is_empty() => {
                Ok(Some(SecretString::from(value.trim().to_string())))
            }
            Ok(_) => Ok(None),
            Err(keyring::Error::NoEntry) => {
                debug!(service = %key, "no refresh token in keyring");
                Ok(None)
            }
            Err(e) => Err(keyring_error(e)),
        }
    }
}

fn keyring_error(err: keyring::Error) -> Error {
    Error::StoreUnavailable(format!("keyring: {}", err))
}

/// In-process credential store.
///
/// Useful for tests and for embedding the client where the token is handed
/// over by another system. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SecretString>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `refresh_token` under `key`.
    pub fn with_token(key: &ServiceKey, refresh_token: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(
                key.as_str().to_string(),
                SecretString::from(refresh_token.into()),
            );
        }
        store
    }

    /// Number of successful `store` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, key: &ServiceKey, refresh_token: &SecretString) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store lock poisoned".into()))?;
        entries.insert(key.as_str().to_string(), refresh_token.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, key: &ServiceKey) -> Result<Option<SecretString>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store lock poisoned".into()))?;
        Ok(entries.get(key.as_str()).cloned())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("MemoryStore")
            .field("keys", &keys)
            .field("writes", &self.writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_overwrites() {
        let key = ServiceKey::default();
        let store = MemoryStore::new();
        assert!(store.load(&key).unwrap().is_none());

        store.store(&key, &SecretString::from("first".to_string())).unwrap();
        store.store(&key, &SecretString::from("second".to_string())).unwrap();

        let loaded = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "second");
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_memory_store_keys_are_isolated() {
        let store = MemoryStore::with_token(&ServiceKey::new("a"), "token-a");
        assert!(store.load(&ServiceKey::new("b")).unwrap().is_none());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_memory_store_debug_redacts() {
        let store = MemoryStore::with_token(&ServiceKey::default(), "very-secret-refresh");
        let debug = format!("{:?}", store);
        assert!(!debug.contains("very-secret-refresh"));
        assert!(debug.contains("mcp.localline"));
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_store_round_trip() {
        let key = ServiceKey::new("localline.test.keyring");
        let store = KeyringStore::new();
        store
            .store(&key, &SecretString::from("keyring-test-token".to_string()))
            .unwrap();
        let loaded = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "keyring-test-token");
    }
}
