use std::sync::Arc;
use std::thread;

use anyhow::Result;
use credcache::cache::CredentialCache;
use credcache::lock::{FileLocker, Locker};
use credcache::store::{MemorySecretStore, SecretStore};
use tempfile::TempDir;

fn cache_for(
    lock_dir: &std::path::Path,
    store: Arc<MemorySecretStore>,
) -> Result<CredentialCache> {
    // Each cache gets its own FileLocker on the shared directory, the same
    // shape as two separate process invocations contending on one lock file.
    let locker = Arc::new(FileLocker::new(lock_dir)?);
    Ok(CredentialCache::with_parts(
        "providerA",
        "alice",
        locker as Arc<dyn Locker>,
        store as Arc<dyn SecretStore>,
    ))
}

#[test]
fn racing_saves_preserve_each_others_roles() -> Result<()> {
    let lock_dir = TempDir::new()?;
    let store = Arc::new(MemorySecretStore::new());

    let mut handles = Vec::new();
    for i in 0..4 {
        let mut cache = cache_for(lock_dir.path(), Arc::clone(&store))?;
        handles.push(thread::spawn(move || -> Result<()> {
            let role = format!("arn:aws:iam::111:role/role-{i}");
            let record = format!(r#"{{"AccessKeyId":"AKIA{i}"}}"#);
            cache.save(&role, &record)?;
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().expect("save thread panicked")?;
    }

    let mut reader = cache_for(lock_dir.path(), store)?;
    reader.load()?;
    for i in 0..4 {
        let creds = reader.get(&format!("arn:aws:iam::111:role/role-{i}"))?;
        assert_eq!(creds.access_key_id, format!("AKIA{i}"));
    }
    Ok(())
}

#[test]
fn load_save_clear_cycle_with_file_locks() -> Result<()> {
    let lock_dir = TempDir::new()?;
    let store = Arc::new(MemorySecretStore::new());

    let mut cache = cache_for(lock_dir.path(), Arc::clone(&store))?;
    cache.load()?;
    cache.save(
        "arn:aws:iam::111:role/foo",
        r#"{"AccessKeyId":"AKIAEXAMPLE"}"#,
    )?;

    let mut other = cache_for(lock_dir.path(), Arc::clone(&store))?;
    other.load()?;
    assert_eq!(
        other.get("arn:aws:iam::111:role/foo")?.access_key_id,
        "AKIAEXAMPLE"
    );

    other.clear()?;
    let mut after = cache_for(lock_dir.path(), store)?;
    after.load()?;
    assert!(after.get("arn:aws:iam::111:role/foo").is_err());
    Ok(())
}
