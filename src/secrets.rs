use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

const KEYRING_SERVICE: &str = "com.citykit.client";

pub const KEY_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const KEY_REFRESH_TOKEN: &str = "REFRESH_TOKEN_KEY";
pub const KEY_USER_ID: &str = "USER_ID_KEY";
pub const KEY_ACCESS_TOKEN_EXPIRATION: &str = "ACCESS_TOKEN_EXPIRATION";
pub const KEY_REFRESH_TOKEN_EXPIRATION: &str = "REFRESH_TOKEN_EXPIRATION";

/// Everything the session writes at rest. Logout removes all of these.
pub const SESSION_KEYS: [&str; 5] = [
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_USER_ID,
    KEY_ACCESS_TOKEN_EXPIRATION,
    KEY_REFRESH_TOKEN_EXPIRATION,
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("secret store is unavailable")]
    Unavailable,
    #[error("secret store rejected the operation: {0}")]
    Backend(String),
}

/// Encrypted key/value persistence for session material. Failures
/// propagate; the caller decides what an absent value means.
pub trait SecretStore: Send + Sync + 'static {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Platform keyring, one entry per key under a fixed service.
pub struct KeyringStore {
    service: &'static str,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE,
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(self.service, key).map_err(map_keyring_error)
    }

    /// A missing entry still counts as available.
    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry(KEY_REFRESH_TOKEN) else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(keyring::Error::NoStorageAccess(_)) => false,
            Err(keyring::Error::PlatformFailure(_)) => false,
            Err(_) => false,
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
            StoreError::Unavailable
        }
        other => StoreError::Backend(other.to_string()),
    }
}

impl SecretStore for KeyringStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(map_keyring_error)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            match self.entry(key)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(map_keyring_error(err)),
            }
        }
        Ok(())
    }
}

/// Process-local store for tests and hosts that opt out of persistence.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.values
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

impl SecretStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.locked()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.locked()?.get(key).cloned())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut values = self.locked()?;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}
