use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_string_pretty};
use tracing::debug;

use crate::storage::{
    KeyValueStore, StorageError,
    atomic::{FileLock, replace_file},
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    pub entries: BTreeMap<String, Value>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Key-value store kept in a single JSON document on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<StoreDocument, StorageError> {
        use crate::storage::migrations::{apply_migrations, detect_version};

        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let file_version = detect_version(&content)?;

                if file_version > CURRENT_VERSION {
                    return Err(StorageError::FutureVersion(file_version));
                }

                let mut data: Value =
                    serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                        path: self.path.clone(),
                        source: e,
                    })?;

                if file_version < CURRENT_VERSION {
                    debug!(path = %self.path.display(), from = file_version, to = CURRENT_VERSION, "migrating store");
                    data = apply_migrations(data, file_version, CURRENT_VERSION)?;
                }

                serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Read-modify-write under the lock file
    fn update(&self, change: impl FnOnce(&mut StoreDocument)) -> Result<(), StorageError> {
        let lock = FileLock::acquire(&self.path)?;

        let mut document = self.load()?;
        change(&mut document);
        document.version = CURRENT_VERSION;

        let json =
            to_string_pretty(&document).map_err(|e| StorageError::SerializeFailed { source: e })?;
        replace_file(&self.path, &json)?;
        lock.unlock()?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.load()?.entries.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.update(|document| {
            document.entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|document| {
            document.entries.remove(key);
        })
    }
}
