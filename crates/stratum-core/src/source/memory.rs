use super::{parse_object, ConfigSource};
use crate::error::{DeployError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Documents held in memory, keyed by `dir/file` path.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    documents: BTreeMap<String, Vec<u8>>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document at `path` (e.g. `config/tenant/acme.json`).
    pub fn with_document(mut self, path: &str, value: Value) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: &str, value: Value) {
        self.documents
            .insert(path.to_string(), value.to_string().into_bytes());
    }

    /// Add raw text, which need not be valid JSON.
    pub fn insert_raw(&mut self, path: &str, text: &str) {
        self.documents
            .insert(path.to_string(), text.as_bytes().to_vec());
    }
}

impl ConfigSource for MemoryConfigSource {
    fn fetch_document(&self, dir: &str, file_name: &str) -> Result<Map<String, Value>> {
        let path = crate::paths::join(dir, file_name);
        match self.documents.get(&path) {
            Some(bytes) => parse_object(&path, bytes),
            None => Err(DeployError::DocumentNotFound { path }),
        }
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .documents
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}
