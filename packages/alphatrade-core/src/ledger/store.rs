//! Key-value persistence backends for the ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::{error, warn};

/// Failure of the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on record {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

/// String records under fixed keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a record. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write several records as one unit.
    async fn put_batch(&self, records: &[(&str, String)]) -> Result<(), StoreError>;

    /// Remove several records. Missing keys are ignored.
    async fn remove_batch(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// One `<key>.json` file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn staging_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.tmp"))
    }

    fn backup_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.bak"))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    /// Either every record is replaced or none is.
    async fn put_batch(&self, records: &[(&str, String)]) -> Result<(), StoreError> {
        let Some((first_key, _)) = records.first() else {
            return Ok(());
        };
        fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(first_key))?;

        let result = self.write_batch(records).await;
        self.remove_scratch_files(records).await;
        result
    }

    async fn remove_batch(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(key)(e)),
            }
        }
        Ok(())
    }
}

impl FileStore {
    async fn write_batch(&self, records: &[(&str, String)]) -> Result<(), StoreError> {
        // Stage every record and set the live files aside before any rename.
        let mut backed_up = Vec::with_capacity(records.len());
        for (key, content) in records {
            fs::write(self.staging_path_for(key), content)
                .await
                .map_err(io_error(key))?;
            backed_up.push(self.back_up(key).await?);
        }

        for (i, (key, _)) in records.iter().enumerate() {
            if let Err(e) = fs::rename(self.staging_path_for(key), self.path_for(key)).await {
                self.roll_back(&records[..i], &backed_up[..i]).await;
                return Err(io_error(key)(e));
            }
        }
        Ok(())
    }

    /// Copy the live record aside. Returns whether there was one.
    async fn back_up(&self, key: &str) -> Result<bool, StoreError> {
        let live = self.path_for(key);
        match fs::metadata(&live).await {
            Ok(meta) if meta.is_file() => {
                fs::copy(&live, self.backup_path_for(key))
                    .await
                    .map_err(io_error(key))?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    /// Put back the records of `committed` as they were before the batch.
    async fn roll_back(&self, committed: &[(&str, String)], backed_up: &[bool]) {
        for ((key, _), had_record) in committed.iter().zip(backed_up) {
            let restored = if *had_record {
                fs::rename(self.backup_path_for(key), self.path_for(key)).await
            } else {
                fs::remove_file(self.path_for(key)).await
            };
            if let Err(e) = restored {
                error!(key = *key, error = %e, "Failed to roll back record");
            }
        }
    }

    async fn remove_scratch_files(&self, records: &[(&str, String)]) {
        for (key, _) in records {
            for path in [self.staging_path_for(key), self.backup_path_for(key)] {
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Leftover scratch file"),
                }
            }
        }
    }
}

/// In-process store (no persistence).
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    async fn put_batch(&self, new_records: &[(&str, String)]) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        for (key, content) in new_records {
            records.insert(key.to_string(), content.clone());
        }
        Ok(())
    }

    async fn remove_batch(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        for key in keys {
            records.remove(*key);
        }
        Ok(())
    }
}
