//! Locked, all-or-nothing writes for the JSON files kept on disk.

use std::{
    fs::{File, OpenOptions, rename, write},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use uuid::Uuid;

/// I/O failure on one of the files touched while writing
#[derive(Debug)]
pub struct WriteError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl WriteError {
    fn at(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
        move |source| WriteError {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Exclusive lock on the `.lock` file next to a data file. Dropping it
/// releases the lock as well.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(data_path: &Path) -> Result<FileLock, WriteError> {
        let path = data_path.with_extension("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(WriteError::at(&path))?;
        FileExt::lock_exclusive(&file).map_err(WriteError::at(&path))?;
        Ok(FileLock { file, path })
    }

    pub fn unlock(self) -> Result<(), WriteError> {
        FileExt::unlock(&self.file).map_err(WriteError::at(&self.path))
    }
}

/// Writes `contents` to a uniquely named sibling of `path`, then renames it
/// into place so readers never see a half-written file.
pub fn replace_file(path: &Path, contents: &str) -> Result<(), WriteError> {
    let temp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), Uuid::new_v4()));
    write(&temp_path, contents).map_err(WriteError::at(&temp_path))?;
    rename(&temp_path, path).map_err(WriteError::at(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_file_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        replace_file(&path, "[1]").unwrap();
        replace_file(&path, "[2]").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[2]");
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["data.json"]);
    }

    #[test]
    fn test_replace_file_reports_the_failing_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("data.json");

        let error = replace_file(&path, "{}").unwrap_err();
        assert!(error.path.starts_with(dir.path().join("missing")));
    }

    #[test]
    fn test_lock_can_be_taken_again_after_unlock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        FileLock::acquire(&path).unwrap().unlock().unwrap();
        let lock = FileLock::acquire(&path).unwrap();
        assert!(dir.path().join("data.lock").exists());
        drop(lock);
        FileLock::acquire(&path).unwrap().unlock().unwrap();
    }
}
