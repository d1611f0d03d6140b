use anyhow::{anyhow, Context};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};
use crate::models::ShoppingStore;

/// How long to wait for another process to release the lock file
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Handles saving and loading shopping lists from a YAML file, with
/// advisory file locking so two processes never interleave writes
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let lock_file_path = sibling_path(&file_path, "lock");
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Acquire an exclusive lock on the file for writing.
    /// The returned handle must be held for the duration of the operation.
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(|| FileExt::try_lock_exclusive(&lock_file))?;

        // Lock holder info, for debugging stale locks
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        Ok(lock_file)
    }

    /// Acquire a shared lock on the file for reading
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(|| FileExt::try_lock_shared(&lock_file))?;
        Ok(Some(lock_file))
    }

    fn wait_for_lock<F>(&self, mut try_lock: F) -> Result<()>
    where
        F: FnMut() -> std::io::Result<()>,
    {
        let start = Instant::now();
        loop {
            match try_lock() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(anyhow!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        )
                        .into());
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to acquire lock on {:?}", self.lock_file_path))
                        .into())
                }
            }
        }
    }

    /// Loads the store from the YAML file, creating an empty one if the
    /// file does not exist yet
    pub fn load(&self) -> Result<ShoppingStore> {
        if !self.file_path.exists() {
            log::info!("Creating new shopping list file at {:?}", self.file_path);
            let default_store = ShoppingStore::new();
            self.save(&default_store)?;
            return Ok(default_store);
        }

        let _lock = self.acquire_read_lock()?;
        self.read_unlocked()
    }

    /// Saves the store to the YAML file
    pub fn save(&self, store: &ShoppingStore) -> Result<()> {
        let _lock = self.acquire_write_lock()?;
        self.write_unlocked(store)
        // Lock is released when _lock is dropped
    }

    /// Reloads the file, applies `update_fn` and writes the result, all
    /// under one exclusive lock. Nothing is written if `update_fn` fails.
    pub fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut ShoppingStore) -> Result<()>,
    ) -> Result<ShoppingStore> {
        let _lock = self.acquire_write_lock()?;

        let mut store = if self.file_path.exists() {
            self.read_unlocked()?
        } else {
            ShoppingStore::new()
        };

        update_fn(&mut store)?;
        store.validate()?;
        self.write_unlocked(&store)?;
        Ok(store)
    }

    fn read_unlocked(&self) -> Result<ShoppingStore> {
        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;

        // Every write produces a serialized store, so an empty file means a lost write
        if file.metadata()?.len() == 0 {
            let err = StoreError::Corrupt(format!("{:?} is empty", self.file_path));
            log::warn!("Rejecting {:?}: {}", self.file_path, err);
            return Err(err);
        }

        let reader = BufReader::new(file);

        let store: ShoppingStore = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))?;

        if let Err(e) = store.validate() {
            log::warn!("Rejecting {:?}: {}", self.file_path, e);
            return Err(e);
        }
        Ok(store)
    }

    /// Writes to a temporary sibling file, flushes it to disk and renames it
    /// into place. A failed write leaves the previous contents intact.
    fn write_unlocked(&self, store: &ShoppingStore) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(store)?;
        let tmp_path = sibling_path(&self.file_path, "tmp");
        let mut tmp_file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {:?}", tmp_path))?;
        tmp_file
            .write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        tmp_file
            .sync_all()
            .with_context(|| format!("Failed to flush {:?}", tmp_path))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.file_path)
            .with_context(|| format!("Failed to replace {:?}", self.file_path))?;
        sync_parent_dir(&self.file_path)
            .with_context(|| format!("Failed to flush directory of {:?}", self.file_path))?;
        Ok(())
    }
}

/// Makes a completed rename durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// `lists.yaml` -> `lists.yaml.<suffix>`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ShoppingList};
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lists.yaml");
        let storage = Storage::new(&path);

        let store = storage.load().unwrap();
        assert!(store.lists().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_sibling_paths() {
        let storage = Storage::new("/tmp/lists.yaml");
        assert_eq!(storage.lock_file_path, PathBuf::from("/tmp/lists.yaml.lock"));
        assert_eq!(
            sibling_path(storage.path(), "tmp"),
            PathBuf::from("/tmp/lists.yaml.tmp")
        );
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("lists.yaml"));

        let mut store = ShoppingStore::new();
        store.insert_list(ShoppingList::new("Groceries", chrono::Utc::now()));
        storage.save(&store).unwrap();
        let before = fs::read_to_string(storage.path()).unwrap();

        let result = storage.update_atomically(&mut |s: &mut ShoppingStore| {
            s.insert_list(ShoppingList::new("Hardware", chrono::Utc::now()));
            s.insert_item(Item::new(uuid::Uuid::new_v4(), "Orphan", "", ""))
        });
        assert!(result.unwrap_err().is_not_found());

        let after = fs::read_to_string(storage.path()).unwrap();
        assert_eq!(before, after);
        assert_eq!(storage.load().unwrap().lists().len(), 1);
    }

    #[test]
    fn test_load_rejects_orphan_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lists.yaml");
        let yaml = format!(
            "version: 1\nlists: []\nitems:\n- id: {}\n  list_id: {}\n  label: Milk\n  sub_label: ''\n  annotation: ''\n  done: false\n",
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4()
        );
        fs::write(&path, yaml).unwrap();

        let err = Storage::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("lists.yaml"));

        let mut store = ShoppingStore::new();
        store.insert_list(ShoppingList::new("Groceries", chrono::Utc::now()));
        storage.save(&store).unwrap();

        assert!(!sibling_path(storage.path(), "tmp").exists());
        assert!(fs::metadata(storage.path()).unwrap().len() > 0);
        assert_eq!(storage.load().unwrap(), store);
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("lists.yaml"));

        let mut store = ShoppingStore::new();
        store.insert_list(ShoppingList::new("Groceries", chrono::Utc::now()));
        storage.save(&store).unwrap();
        File::create(storage.path()).unwrap();

        assert!(matches!(storage.load(), Err(StoreError::Corrupt(_))));
        let result = storage.update_atomically(&mut |_: &mut ShoppingStore| Ok(()));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(fs::metadata(storage.path()).unwrap().len(), 0);
    }
}
