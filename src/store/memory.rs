//! In-memory secret store for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{SecretStore, StoreError};

/// In-memory [`SecretStore`] for testing purposes.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw blob access, for asserting on the persisted wire format.
    pub fn raw(&self, service: &str, account: &str) -> Option<String> {
        let secrets = self.secrets.lock().expect("secret store lock poisoned");
        secrets
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError> {
        let secrets = self.secrets.lock().expect("secret store lock poisoned");
        Ok(secrets
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().expect("secret store lock poisoned");
        secrets.insert(
            (service.to_string(), account.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().expect("secret store lock poisoned");
        secrets.remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}
