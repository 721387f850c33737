//! Locked read-modify-write credential cache.
//!
//! All cached role credentials for one (service, account) pair live together
//! in a single JSON document in the OS secret store. The store has no
//! atomicity of its own, so every operation that touches the document runs
//! under a named cross-process advisory lock and re-reads the committed state
//! before writing. Concurrent invocations (two CLI runs racing) therefore
//! merge instead of clobbering each other's entries.
//!
//! The cache treats each role's credential record as an opaque string; it is
//! only decoded into [`AwsCredentials`] by the [`CredentialCache::get`]
//! accessor.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::AwsCredentials;
use crate::error::CacheError;
use crate::lock::{FileLocker, LockOptions, Locker};
use crate::store::{KeyringSecretStore, SecretStore};

/// Service-key namespace: a provider's document lives under
/// `"credcache/<provider>"`.
const SERVICE_NAMESPACE: &str = "credcache";

/// How long `load`/`save`/`clear` wait for the cross-process lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Construction knobs for [`CredentialCache::new_with_options`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Directory holding the advisory lock files.
    pub lock_dir: PathBuf,

    /// Lock acquisition timeout.
    pub lock_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            lock_dir: env::temp_dir().join("credcache-lock"),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Persisted wire format: one JSON document holding every role's serialized
/// record together, e.g. `{"credentials":{"<role>":"<record json>"}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    credentials: HashMap<String, String>,
}

/// Cache of short-lived role credentials in the OS secret store, guarded by a
/// cross-process advisory lock.
///
/// One instance is meant to be constructed per process invocation. The
/// in-memory entries are private to the instance; only [`load`], [`save`] and
/// [`clear`] touch the shared persisted document, and each does so inside the
/// lock's critical section.
///
/// [`load`]: CredentialCache::load
/// [`save`]: CredentialCache::save
/// [`clear`]: CredentialCache::clear
pub struct CredentialCache {
    service: String,
    account: String,
    lock_name: String,
    lock_timeout: Duration,
    locker: Arc<dyn Locker>,
    store: Arc<dyn SecretStore>,
    credentials: HashMap<String, String>,
}

impl CredentialCache {
    /// Cache for `provider`, backed by the OS secret store and file locks in
    /// the default temporary directory.
    pub fn new(provider: &str) -> Result<Self, CacheError> {
        Self::new_with_options(provider, CacheOptions::default())
    }

    pub fn new_with_options(provider: &str, options: CacheOptions) -> Result<Self, CacheError> {
        // An unusable lock directory means no invocation can ever serialize
        // against another: broken environment, not a recoverable error.
        let locker = FileLocker::new(&options.lock_dir).map_err(|err| {
            CacheError::environment(
                format!(
                    "failed to set up lock directory {}",
                    options.lock_dir.display()
                ),
                err,
            )
        })?;

        let mut cache = Self::with_parts(
            provider,
            current_user(),
            Arc::new(locker),
            Arc::new(KeyringSecretStore::new()),
        );
        cache.lock_timeout = options.lock_timeout;
        Ok(cache)
    }

    /// Build a cache from explicit collaborators.
    ///
    /// The seam used by tests and by embedders that bring their own lock or
    /// store backend.
    pub fn with_parts(
        provider: &str,
        account: impl Into<String>,
        locker: Arc<dyn Locker>,
        store: Arc<dyn SecretStore>,
    ) -> Self {
        let service = format!("{SERVICE_NAMESPACE}/{provider}");
        // Lock scope follows the service key: caches for different providers
        // contend only on their own document.
        let lock_name = service.replace('/', "-");
        Self {
            service,
            account: account.into(),
            lock_name,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            locker,
            store,
            credentials: HashMap::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Replace the in-memory entries with the persisted document.
    ///
    /// A store with no document for this (service, account) pair is an empty
    /// cache, not an error. On any failure the in-memory entries are left
    /// untouched.
    pub fn load(&mut self) -> Result<(), CacheError> {
        self.with_exclusive_lock(|cache| {
            match cache.store.get(&cache.service, &cache.account) {
                Ok(Some(blob)) => {
                    let doc: CacheDocument =
                        serde_json::from_str(&blob).map_err(CacheError::CorruptData)?;
                    cache.credentials = doc.credentials;
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(err) => Err(CacheError::StoreRead(err)),
            }
        })
    }

    /// Look up a role's record among the entries read by the last [`load`].
    ///
    /// Pure in-memory accessor: no locking, no store I/O.
    ///
    /// [`load`]: CredentialCache::load
    pub fn get(&self, role: &str) -> Result<AwsCredentials, CacheError> {
        let blob = self
            .credentials
            .get(role)
            .ok_or_else(|| CacheError::NotFound(role.to_string()))?;
        let creds: AwsCredentials =
            serde_json::from_str(blob).map_err(CacheError::CorruptData)?;
        tracing::info!(role, "using credentials cached in the OS secret store");
        Ok(creds)
    }

    /// Merge one role's serialized record into the persisted document.
    ///
    /// Re-reads the committed document under the lock before merging, so two
    /// invocations saving different roles cannot lose each other's entries,
    /// whatever state either held in memory beforehand.
    pub fn save(&mut self, role: &str, record: &str) -> Result<(), CacheError> {
        self.with_exclusive_lock(|cache| {
            match cache.store.get(&cache.service, &cache.account) {
                Ok(Some(blob)) => {
                    let doc: CacheDocument =
                        serde_json::from_str(&blob).map_err(CacheError::CorruptData)?;
                    cache.credentials = doc.credentials;
                }
                Ok(None) => {}
                // A failing read mid-save means the store itself is broken;
                // writing on top of unknown state could lose entries.
                Err(err) => {
                    return Err(CacheError::environment(
                        "secret store read failed while saving credentials",
                        err,
                    ));
                }
            }

            cache
                .credentials
                .insert(role.to_string(), record.to_string());

            let doc = CacheDocument {
                credentials: cache.credentials.clone(),
            };
            let blob = serde_json::to_string(&doc).map_err(CacheError::Serialization)?;
            cache
                .store
                .set(&cache.service, &cache.account, &blob)
                .map_err(CacheError::StoreWrite)
        })
    }

    /// Delete the persisted document and forget the in-memory entries.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.with_exclusive_lock(|cache| {
            cache
                .store
                .delete(&cache.service, &cache.account)
                .map_err(CacheError::StoreDelete)?;
            cache.credentials.clear();
            Ok(())
        })
    }

    /// Run `f` holding the exclusive cache lock, releasing on every path.
    ///
    /// A failed release takes precedence over `f`'s own result: a lock that
    /// stays held deadlocks every future invocation.
    fn with_exclusive_lock<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let guard = self
            .locker
            .acquire(&self.lock_name, LockOptions::exclusive(self.lock_timeout))
            .map_err(|source| CacheError::Lock {
                name: self.lock_name.clone(),
                source,
            })?;

        let result = f(self);

        match guard.release() {
            Ok(()) => result,
            Err(err) => Err(CacheError::environment(
                format!("failed to release cache lock {:?}", self.lock_name),
                err,
            )),
        }
    }
}

/// Current user name from the process environment; the account half of the
/// secret store key.
fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}
