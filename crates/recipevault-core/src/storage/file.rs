use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::{validate_key, Storage, StorageError};

/// Directory-backed storage: each key is a file named after the key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Unique per write, so concurrent writers of one key never rename each other's file
    fn temp_path(&self, key: &str) -> PathBuf {
        static NEXT_WRITE: AtomicU64 = AtomicU64::new(0);
        let write = NEXT_WRITE.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), write))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        match std::fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::Corrupted {
                key: key.to_string(),
                reason: "not valid UTF-8".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        std::fs::create_dir_all(&self.dir)?;

        // Write then rename so readers never observe a partial value
        let temp = self.temp_path(key);
        std::fs::write(&temp, value)?;
        std::fs::rename(&temp, self.entry_path(key))?;
        debug!(key, dir = ?self.dir, "Stored value");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => {
                debug!(key, dir = ?self.dir, "Deleted value");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
