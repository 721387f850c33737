use crate::lock::LockError;
use crate::store::StoreError;

/// Errors surfaced by [`CredentialCache`](crate::cache::CredentialCache).
///
/// Most variants are recoverable by the caller (report and move on, or retry
/// the whole invocation). [`CacheError::Environment`] is not: it means the
/// lock subsystem or the secret store itself is broken, and continuing risks
/// silent corruption or a deadlock for future invocations. Check with
/// [`CacheError::is_fatal`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cross-process cache lock could not be acquired.
    #[error("Credential cache is locked (resource {name:?})")]
    Lock {
        name: String,
        #[source]
        source: LockError,
    },

    #[error("Failed to read cached credentials from the OS secret store")]
    StoreRead(#[source] StoreError),

    #[error("Failed to write cached credentials to the OS secret store")]
    StoreWrite(#[source] StoreError),

    #[error("Failed to delete cached credentials from the OS secret store")]
    StoreDelete(#[source] StoreError),

    /// A persisted blob exists but does not parse as a cache document.
    #[error("Cached credential data is corrupt")]
    CorruptData(#[source] serde_json::Error),

    /// In-memory state failed to serialize before a write. Defensive; should
    /// not occur for documents this crate constructs.
    #[error("Failed to serialize the credential cache")]
    Serialization(#[source] serde_json::Error),

    /// No cached entry for the requested role. Expected and common.
    #[error("No cached credential for role {0:?}")]
    NotFound(String),

    /// The environment the cache depends on is unusable: the lock directory
    /// cannot be set up, a held lock cannot be released, or the secret store
    /// failed mid-save. Callers must treat this as terminal.
    #[error("Credential cache environment failure: {reason}")]
    Environment {
        reason: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CacheError {
    pub(crate) fn environment(
        reason: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Environment {
            reason: reason.into(),
            source: source.into(),
        }
    }

    /// True for failures that indicate a broken environment rather than a
    /// recoverable condition. Top-level callers should abort on these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Environment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_environment_errors_are_fatal() {
        let fatal = CacheError::environment(
            "lock release failed",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(fatal.is_fatal());

        assert!(!CacheError::NotFound("role".to_string()).is_fatal());
        assert!(!CacheError::Lock {
            name: "cache".to_string(),
            source: LockError::Timeout {
                name: "cache".to_string(),
                timeout: std::time::Duration::from_secs(1),
            },
        }
        .is_fatal());
    }
}
