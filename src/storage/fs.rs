//! Local filesystem storage

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use super::{validate_name, ReadSeek, Storage, StorageError};

/// Files stored under a root directory
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `name` under the root
    pub fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

fn not_found_or_io(name: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}

impl Storage for FileSystemStorage {
    fn open(&self, name: &str) -> Result<Box<dyn ReadSeek>, StorageError> {
        let path = self.path(name)?;
        let file = File::open(&path).map_err(|e| not_found_or_io(name, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let path = self.path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique temp name so concurrent writers of the same file don't collide
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(name.to_string())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn size(&self, name: &str) -> Result<u64, StorageError> {
        let path = self.path(name)?;
        let metadata = fs::metadata(path).map_err(|e| not_found_or_io(name, e))?;
        Ok(metadata.len())
    }
}
