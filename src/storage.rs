//! Size-limited key-value storage.
//!
//! The engine persists two string values: the full snapshot and the view
//! preference. `FileStore` keeps each key in its own JSON file under a directory;
//! `MemoryStore` keeps them in a map. Both refuse writes that would push the total
//! stored size past their quota.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// String-keyed storage with a byte quota.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

fn check_quota(used_by_others: usize, value: &str, limit: usize) -> Result<(), StorageError> {
    let needed = used_by_others + value.len();
    if needed > limit {
        return Err(StorageError::QuotaExceeded { needed, limit });
    }
    Ok(())
}

/// File-backed store, one `<key>.json` per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: &Path, quota_bytes: usize) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        Ok(FileStore { dir: dir.to_path_buf(), quota_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn used_bytes_except(&self, path: &Path) -> Result<usize, StorageError> {
        let mut total = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let p = entry.path();
            if p == path || p.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            total += entry.metadata()?.len() as usize;
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Atomic-ish write via temp file + rename.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        check_quota(self.used_bytes_except(&path)?, value, self.quota_bytes)?;

        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(value.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory store with the same quota rules as `FileStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        MemoryStore { entries: HashMap::new(), quota_bytes: Some(quota_bytes) }
    }

    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota_bytes {
            let others: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            check_quota(others, value, limit)?;
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), 1024).unwrap();
        assert_eq!(store.get("taskdeck.snapshot").unwrap(), None);
        store.set("taskdeck.snapshot", "{}").unwrap();
        assert_eq!(store.get("taskdeck.snapshot").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("taskdeck.snapshot.json").exists());
        store.remove("taskdeck.snapshot").unwrap();
        assert_eq!(store.get("taskdeck.snapshot").unwrap(), None);
    }

    #[test]
    fn test_file_store_quota_counts_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), 10).unwrap();
        store.set("a", "123456").unwrap();
        store.set("a", "1234567890").unwrap();
        let err = store.set("b", "12345").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 15, limit: 10 }));
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), 1024).unwrap();
        assert!(matches!(store.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_memory_store_quota() {
        let mut store = MemoryStore::with_quota(4);
        store.set("k", "abcd").unwrap();
        assert!(store.set("k", "abcde").is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("abcd"));
        store.set_quota(None);
        store.set("k", "abcdef").unwrap();
    }
}
