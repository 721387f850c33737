//! Cross-process advisory locking.
//!
//! The cache serializes its read-modify-write critical sections across
//! processes with a named advisory lock. [`Locker`] is the seam; the real
//! implementation is [`FileLocker`], which maps lock names onto `flock`-style
//! file locks in a dedicated directory.
//!
//! Release is explicit rather than Drop-only so that a failed release is
//! observable and can be escalated. Dropping a guard without releasing still
//! unlocks on a best-effort basis (the file handle is closed), so a panic
//! inside a critical section cannot deadlock future invocations.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Timed out after {timeout:?} waiting for lock {name:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Lock file operation failed for {name:?}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set up lock directory {dir:?}")]
    Setup {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How a lock should be acquired.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    pub shared: bool,
    pub timeout: Duration,
}

impl LockOptions {
    pub fn exclusive(timeout: Duration) -> Self {
        Self {
            shared: false,
            timeout,
        }
    }

    pub fn shared(timeout: Duration) -> Self {
        Self {
            shared: true,
            timeout,
        }
    }
}

/// A held lock.
pub trait LockGuard: Send {
    /// Give the lock back. Consumes the guard: a lock can only be released
    /// once, and only by the holder that acquired it.
    fn release(self: Box<Self>) -> Result<(), LockError>;
}

/// Named advisory locks shared across processes.
pub trait Locker: Send + Sync {
    /// Block until the named lock is acquired or `options.timeout` elapses.
    fn acquire(&self, name: &str, options: LockOptions) -> Result<Box<dyn LockGuard>, LockError>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// File-backed [`Locker`] rooted at a directory, one lock file per name.
///
/// Lock files are created on demand and never removed; the lock state lives
/// in the kernel, not in the file contents.
pub struct FileLocker {
    dir: PathBuf,
}

impl FileLocker {
    /// Create a locker rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, LockError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| LockError::Setup {
            dir: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Lock names may contain characters that are not path-safe (service
    /// keys contain `/`); map them to a flat file name.
    fn lock_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.lock"))
    }
}

impl Locker for FileLocker {
    fn acquire(&self, name: &str, options: LockOptions) -> Result<Box<dyn LockGuard>, LockError> {
        let path = self.lock_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                name: name.to_string(),
                source,
            })?;

        let deadline = Instant::now() + options.timeout;
        let mut contended = false;
        loop {
            // Fully qualified: recent std gained inherent lock methods on
            // `File` that would otherwise shadow the fs2 trait.
            let attempt = if options.shared {
                FileExt::try_lock_shared(&file)
            } else {
                FileExt::try_lock_exclusive(&file)
            };
            match attempt {
                Ok(()) => {
                    return Ok(Box::new(FileLockGuard {
                        name: name.to_string(),
                        file,
                    }))
                }
                Err(err)
                    if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
                {
                    if !contended {
                        tracing::debug!(lock = name, "waiting for contended lock");
                        contended = true;
                    }
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            name: name.to_string(),
                            timeout: options.timeout,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(LockError::Io {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
    }
}

struct FileLockGuard {
    name: String,
    file: std::fs::File,
}

impl LockGuard for FileLockGuard {
    fn release(self: Box<Self>) -> Result<(), LockError> {
        FileExt::unlock(&self.file).map_err(|source| LockError::Io {
            name: self.name.clone(),
            source,
        })
    }
}
