//! Configuration sources: where raw JSON documents come from.
//!
//! A source exposes two operations. `fetch_document` returns one JSON object
//! or fails with [`DeployError::DocumentNotFound`]; `list_files` returns the
//! file names in a directory, and an empty list when the directory is absent.

pub mod fs;
pub mod github;
pub mod memory;

pub use fs::FsConfigSource;
pub use github::GitHubConfigSource;
pub use memory::MemoryConfigSource;

use crate::error::{DeployError, Result};
use crate::snapshot::Snapshot;
use serde_json::{Map, Value};

pub trait ConfigSource: Send + Sync {
    fn fetch_document(&self, dir: &str, file_name: &str) -> Result<Map<String, Value>>;

    fn list_files(&self, dir: &str) -> Result<Vec<String>>;

    fn fetch_snapshot(&self, dir: &str, file_name: &str) -> Result<Snapshot> {
        self.fetch_document(dir, file_name).map(Snapshot::from_map)
    }
}

/// Parse `bytes` as a JSON object, naming `path` on failure.
pub(crate) fn parse_object(path: &str, bytes: &[u8]) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DeployError::MalformedDocument {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DeployError::MalformedDocument {
            path: path.to_string(),
            reason: "document is not a JSON object".to_string(),
        }),
    }
}
