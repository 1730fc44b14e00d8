use std::path::PathBuf;

use serde_json::{Value, to_string_pretty};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::atomic::{WriteError, replace_file};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Project list at '{path}' is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project list at '{path}' is not JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write project list to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize project list: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
}

impl From<WriteError> for FetchError {
    fn from(e: WriteError) -> Self {
        FetchError::SaveFailed {
            path: e.path,
            source: e.source,
        }
    }
}

/// Upstream owner of the project list. Returns the response body untouched;
/// callers validate it before use.
pub trait ProjectSource {
    fn fetch(&self) -> Result<Value, FetchError>;
}

impl<T: ProjectSource + ?Sized> ProjectSource for &T {
    fn fetch(&self) -> Result<Value, FetchError> {
        (**self).fetch()
    }
}

/// Reads an exported `/projects/` response body from disk
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replaces the exported body, e.g. after a project was marked as done
    pub fn save(&self, body: &Value) -> Result<(), FetchError> {
        let json = to_string_pretty(body).map_err(|e| FetchError::SerializeFailed { source: e })?;
        replace_file(&self.path, &json)?;
        info!(path = %self.path.display(), "project list updated");
        Ok(())
    }
}

impl ProjectSource for JsonFileSource {
    fn fetch(&self) -> Result<Value, FetchError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| FetchError::Unavailable {
            path: self.path.clone(),
            source: e,
        })?;
        debug!(path = %self.path.display(), bytes = content.len(), "fetched project list");
        serde_json::from_str(&content).map_err(|e| FetchError::Malformed {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::{FetchError, ProjectSource};

    /// Hands out queued responses in order; an empty queue means unavailable
    #[derive(Default)]
    pub struct ScriptedSource {
        responses: Mutex<Vec<Option<Value>>>,
    }

    impl ScriptedSource {
        pub fn new(responses: Vec<Option<Value>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl ProjectSource for ScriptedSource {
        fn fetch(&self) -> Result<Value, FetchError> {
            match self.responses.lock().unwrap().pop().flatten() {
                Some(body) => Ok(body),
                None => Err(FetchError::Unavailable {
                    path: "<scripted>".into(),
                    source: std::io::Error::other("offline"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_fetch_reads_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.json");
        std::fs::write(&path, r#"{"results": [{"id": 1, "title": "Thesis"}]}"#).unwrap();

        let body = JsonFileSource::new(path).fetch().unwrap();
        assert_eq!(body, json!({"results": [{"id": 1, "title": "Thesis"}]}));
    }

    #[test]
    fn test_save_then_fetch() {
        let dir = tempdir().unwrap();
        let source = JsonFileSource::new(dir.path().join("projects.json"));
        let body = json!([{"id": 1, "title": "Thesis", "completed": true}]);

        source.save(&body).unwrap();
        assert_eq!(source.fetch().unwrap(), body);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let source = JsonFileSource::new(dir.path().join("absent.json"));
        assert!(matches!(
            source.fetch(),
            Err(FetchError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.json");
        std::fs::write(&path, "<html>502 Bad Gateway</html>").unwrap();
        assert!(matches!(
            JsonFileSource::new(path).fetch(),
            Err(FetchError::Malformed { .. })
        ));
    }
}
