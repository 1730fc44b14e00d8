use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

pub mod atomic;
pub mod json;
pub mod migrations;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load store from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save store to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Store document has a malformed '{0}' field")]
    MalformedDocument(&'static str),

    #[error(
        "Store file was created by a newer version of lms (version {0}). Please upgrade lms to open this file."
    )]
    FutureVersion(u32),

    #[error("Store file has unsupported version {0}. This version of lms cannot read this file.")]
    UnsupportedVersion(u32),
}

impl From<atomic::WriteError> for StorageError {
    fn from(e: atomic::WriteError) -> Self {
        StorageError::SaveFailed {
            path: e.path,
            source: e.source,
        }
    }
}

/// Small persistent key-value store, injected wherever state must survive a run
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}
