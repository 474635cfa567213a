//! Durable logical-name → selector cache shared by every locator in a run.

use crate::errors::{HealError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// JSON-file backed healing cache.
///
/// The mapping is loaded once on [`HealingStore::open`]. Every write takes a
/// process-wide lock keyed by the canonical store path, re-reads the file,
/// applies the change and replaces the file atomically. Any number of
/// instances opened on one path therefore serialize their writes, and other
/// processes sharing the path only ever see whole documents. Concurrent
/// writers across processes resolve as last-writer-wins.
#[derive(Debug)]
pub struct HealingStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl HealingStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(store_dir(&path))?;
        let entries = read_entries(&path)?;
        debug!(target: "store", path = %path.display(), entries = entries.len(), "opened healing store");
        Ok(Self {
            write_lock: write_lock(&path),
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn lookup(&self, logical_name: &str) -> Option<String> {
        self.entries.lock().await.get(logical_name).cloned()
    }

    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.entries.lock().await.clone()
    }

    /// Record `selector` for `logical_name`, replacing any previous value.
    pub async fn persist(&self, logical_name: &str, selector: &str) -> Result<()> {
        let (name, value) = (logical_name.to_string(), selector.to_string());
        self.update(move |entries| {
            entries.insert(name, value);
            true
        })
        .await?;

        info!(target: "store", logical_name, selector, "persisted healed locator");
        Ok(())
    }

    /// Drop one entry; returns whether it existed.
    pub async fn remove(&self, logical_name: &str) -> Result<bool> {
        let name = logical_name.to_string();
        self.update(move |entries| entries.remove(&name).is_some()).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.update(|entries| {
            entries.clear();
            true
        })
        .await?;
        Ok(())
    }

    /// Read-modify-write of the whole file under the path lock. `change`
    /// returns whether the file needs rewriting.
    async fn update<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();

        let (on_disk, changed) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut on_disk = read_entries(&path)?;
            let changed = change(&mut on_disk);
            if changed {
                write_entries(&path, &on_disk)?;
            }
            Ok((on_disk, changed))
        })
        .await
        .map_err(|e| HealError::Store(format!("store task failed: {e}")))??;

        *self.entries.lock().await = on_disk;
        Ok(changed)
    }
}

fn store_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// The write lock shared by every store opened on the same file.
fn write_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let key = match (store_dir(path).canonicalize(), path.file_name()) {
        (Ok(dir), Some(file)) => dir.join(file),
        _ => path.to_path_buf(),
    };
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_json::from_str(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            // An unreadable cache must not fail the run; the next write replaces it.
            warn!(target: "store", path = %path.display(), error = %e, "ignoring unreadable healing store");
            Ok(BTreeMap::new())
        }
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let dir = store_dir(path);
    fs::create_dir_all(&dir)?;

    let json = serde_json::to_string_pretty(entries)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| HealError::Store(format!("replacing {}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> HealingStore {
        HealingStore::open(dir.path().join("healing").join("healerStore.json")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.entries().await.is_empty());
        assert_eq!(store.lookup("loginPage.userName").await, None);
    }

    #[tokio::test]
    async fn test_persist_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist("products", ".inventory_item").await.unwrap();
        assert_eq!(store.lookup("products").await.as_deref(), Some(".inventory_item"));

        let reopened = store_in(&dir);
        assert_eq!(reopened.lookup("products").await.as_deref(), Some(".inventory_item"));
    }

    #[tokio::test]
    async fn test_persist_is_idempotent_and_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist("cartItemName", ".a").await.unwrap();
        store.persist("cartItemName", ".b").await.unwrap();
        store.persist("cartItemName", ".b").await.unwrap();

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["cartItemName"], ".b");
    }

    #[tokio::test]
    async fn test_file_is_pretty_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist("products", ".inventory_item").await.unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "{\n  \"products\": \".inventory_item\"\n}");
    }

    #[tokio::test]
    async fn test_interleaved_writers_keep_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.persist("cartItemPrice", ".price").await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.persist("cartItemQuantity", ".qty").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_writes_merge_with_other_workers() {
        let dir = tempfile::tempdir().unwrap();
        let worker_a = store_in(&dir);
        let worker_b = store_in(&dir);

        worker_a.persist("loginPage.userName", "#user-name").await.unwrap();
        worker_b.persist("loginPage.password", "#password").await.unwrap();

        let entries = store_in(&dir).entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(worker_b.lookup("loginPage.userName").await.as_deref(), Some("#user-name"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_instances_on_one_path_keep_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("healing").join("healerStore.json");

        let writers: Vec<_> = (0..40)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move {
                    let store = HealingStore::open(&path).unwrap();
                    store.persist(&format!("page.el{i}"), &format!("#el{i}")).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let entries = HealingStore::open(&path).unwrap().entries().await;
        assert_eq!(entries.len(), 40);
        assert_eq!(entries["page.el17"], "#el17");
    }

    #[test]
    fn test_equivalent_paths_share_a_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("healing")).unwrap();
        let direct = dir.path().join("healing").join("healerStore.json");
        let dotted = dir.path().join("healing").join(".").join("healerStore.json");

        assert!(Arc::ptr_eq(&write_lock(&direct), &write_lock(&dotted)));
        assert!(!Arc::ptr_eq(
            &write_lock(&direct),
            &write_lock(&dir.path().join("other.json"))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("healerStore.json");
        fs::write(&path, "{ not json").unwrap();

        let store = HealingStore::open(&path).unwrap();
        assert!(store.entries().await.is_empty());
        store.persist("products", ".inventory_item").await.unwrap();
        assert_eq!(HealingStore::open(&path).unwrap().entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist("a", ".a").await.unwrap();
        store.persist("b", ".b").await.unwrap();

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.entries().await.len(), 1);

        store.clear().await.unwrap();
        assert!(store_in(&dir).entries().await.is_empty());
    }
}
