//! Durable key-value persistence for quoting state.
//!
//! One JSON file per key under a data directory. The read contract is
//! deliberately forgiving: a corrupt or unreadable blob is treated as
//! absent — the caller gets the default value back and a warning is
//! logged — so a damaged store never takes the application down. Writes
//! go through a temporary file and rename so a crash mid-write cannot
//! leave a half-serialized blob behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors that can occur while persisting state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access data directory: {0}")]
    DataDir(std::io::Error),
    #[error("failed to write state file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize state: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A JSON-file-per-key store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Opens (creating if necessary) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DataDir`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(StorageError::DataDir)?;
        Ok(Self { root })
    }

    /// The directory this store persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Reads the value stored under `key`, or the type's default when the
    /// key is absent, unreadable, or corrupt. Corruption is logged and
    /// recovered from, never surfaced to the caller.
    pub fn read_or_default<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.key_path(key);
        if !path.is_file() {
            return T::default();
        }
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read stored state, resetting to default");
                return T::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt stored state, resetting to default");
                T::default()
            }
        }
    }

    /// Persists `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the value cannot be
    /// serialized, or [`StorageError::FileWrite`] on I/O failure.
    pub fn write<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_string_pretty(value)?;
        let path = self.key_path(key);
        let tmp = self.root.join(format!("{key}.json.tmp"));
        fs::write(&tmp, serialized).map_err(StorageError::FileWrite)?;
        fs::rename(&tmp, &path).map_err(StorageError::FileWrite)?;
        Ok(())
    }

    /// Removes the value stored under `key`. Removing an absent key is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileWrite`] on I/O failure.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::FileWrite(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_absent_key_returns_default() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::open(temp.path()).unwrap();
        let value: Vec<String> = store.read_or_default("missing");
        assert!(value.is_empty());
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::open(temp.path()).unwrap();
        store.write("codes", &vec!["101".to_string()]).unwrap();
        let value: Vec<String> = store.read_or_default("codes");
        assert_eq!(value, vec!["101".to_string()]);
    }

    #[test]
    fn test_corrupt_blob_resets_to_default() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::open(temp.path()).unwrap();
        std::fs::write(temp.path().join("codes.json"), "{not json").unwrap();
        let value: Vec<String> = store.read_or_default("codes");
        assert!(value.is_empty());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::open(temp.path()).unwrap();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("data").join("state");
        let store = JsonStore::open(&nested).unwrap();
        assert_eq!(store.root(), nested.as_path());
        assert!(nested.is_dir());
    }
}
