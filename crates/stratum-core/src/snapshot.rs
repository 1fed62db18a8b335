//! Immutable configuration snapshots and the overlay merge.
//!
//! A [`Snapshot`] wraps a JSON object behind an `Arc`; it is never mutated once
//! built, and every re-resolution produces a new one. [`overlay`] merges
//! snapshots in precedence order: later layers win key-for-key, objects merge
//! recursively, and keys absent from later layers are inherited.

use crate::error::{DeployError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot(Arc<Map<String, Value>>);

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Arc::new(map))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// A detached mutable copy, for collaborators that build a new layer.
    pub fn to_map(&self) -> Map<String, Value> {
        self.0.as_ref().clone()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a `/`-separated path, e.g. `amazon/accountId`.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        parts.try_fold(self.0.get(first)?, |node, part| node.get(part))
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn required_string(&self, key: &str) -> Result<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(DeployError::invalid_config(
                format!("/{key}"),
                format!("expected a string, found {}", kind_of(other)),
            )),
            None => Err(DeployError::invalid_config(
                format!("/{key}"),
                "required value is missing",
            )),
        }
    }

    pub fn required_object(&self, key: &str) -> Result<&Map<String, Value>> {
        required_object(&self.0, key, "")
    }

    /// Sorted-key, pretty-printed JSON; byte-identical for equal snapshots.
    pub fn to_canonical_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.0.as_ref())?)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// Merge `layers` in order; the last layer has the highest precedence.
pub fn overlay<'a, I>(layers: I) -> Snapshot
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    let mut merged = Map::new();
    for layer in layers {
        merge_into(&mut merged, layer.as_map());
    }
    Snapshot::from_map(merged)
}

/// Recursively copy `source` over `target`.
pub fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

pub(crate) fn required_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<&'a Map<String, Value>> {
    let path = format!("{parent}/{key}");
    match map.get(key) {
        Some(Value::Object(obj)) => Ok(obj),
        Some(other) => Err(DeployError::invalid_config(
            path,
            format!("expected an object, found {}", kind_of(other)),
        )),
        None => Err(DeployError::invalid_config(
            path,
            "a configuration object is required here",
        )),
    }
}

pub(crate) fn required_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<&'a str> {
    let path = format!("{parent}/{key}");
    match map.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DeployError::invalid_config(
            path,
            format!("expected a string, found {}", kind_of(other)),
        )),
        None => Err(DeployError::invalid_config(path, "required value is missing")),
    }
}

pub(crate) fn required_string_array(
    map: &Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<Vec<String>> {
    let path = format!("{parent}/{key}");
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(DeployError::invalid_config(
                    path.clone(),
                    format!("must be an array of strings, but it contains {}", kind_of(other)),
                )),
            })
            .collect(),
        Some(other) => Err(DeployError::invalid_config(
            path,
            format!("must be an array of strings, not {}", kind_of(other)),
        )),
        None => Err(DeployError::invalid_config(path, "required array is missing")),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
