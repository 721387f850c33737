//! Secret blob storage.
//!
//! The cache persists a single opaque string per (service, account) pair in
//! the operating system's credential storage. [`SecretStore`] is the seam:
//! `Ok(None)` from [`SecretStore::get`] is the distinguished "no such secret"
//! outcome, while `Err` always means the backend itself failed, so callers
//! can never confuse an empty cache with a broken store.

mod memory;
mod os_keyring;

pub use memory::MemorySecretStore;
pub use os_keyring::KeyringSecretStore;

/// Backend failure from the secret store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("OS secret store error")]
    Keyring(#[from] keyring::Error),

    #[error("{0}")]
    Other(String),
}

/// A single opaque secret per (service, account) pair.
pub trait SecretStore: Send + Sync {
    /// Read the blob. Returns `Ok(None)` if no secret exists for the pair.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError>;

    /// Write (or overwrite) the blob.
    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the blob. Deleting an absent secret is not an error.
    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError>;
}
