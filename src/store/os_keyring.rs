//! OS-native secret store backend.
//!
//! Maps [`SecretStore`] onto the platform credential storage via the
//! `keyring` crate: Keychain on macOS, Credential Manager on Windows, the
//! Secret Service on Linux.

use super::{SecretStore, StoreError};

/// [`SecretStore`] backed by the operating system's credential storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str, account: &str) -> Result<keyring::Entry, StoreError> {
        Ok(keyring::Entry::new(service, account)?)
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError> {
        match Self::entry(service, account)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), StoreError> {
        Self::entry(service, account)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
