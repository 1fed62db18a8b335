use super::{parse_object, ConfigSource};
use crate::error::{DeployError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A configuration tree checked out on the local file system.
#[derive(Debug, Clone)]
pub struct FsConfigSource {
    root: PathBuf,
}

impl FsConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ConfigSource for FsConfigSource {
    fn fetch_document(&self, dir: &str, file_name: &str) -> Result<Map<String, Value>> {
        let rel = crate::paths::join(dir, file_name);
        let path = self.root.join(&rel);
        tracing::debug!(path = %path.display(), "fetch");
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeployError::DocumentNotFound { path: rel });
            }
            Err(e) => return Err(e.into()),
        };
        parse_object(&rel, &bytes)
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.root.join(dir);
        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir, "no such directory, returning empty list");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }
}
