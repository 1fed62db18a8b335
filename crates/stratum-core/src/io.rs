use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting state files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write `data` unless `path` already holds exactly these bytes.
/// Returns true if the file was written.
pub fn write_if_changed(path: &Path, data: &[u8]) -> Result<bool> {
    match std::fs::read(path) {
        Ok(existing) if existing == data => Ok(false),
        Ok(_) => {
            atomic_write(path, data)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            atomic_write(path, data)?;
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read a JSON record, or `None` if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize `value` as pretty JSON and write it if it differs from disk.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<bool> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    write_if_changed(path, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn write_if_changed_skips_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        assert!(write_if_changed(&path, b"one").unwrap());
        assert!(!write_if_changed(&path, b"one").unwrap());
        assert!(write_if_changed(&path, b"two").unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn json_records_round_trip_and_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.json");
        assert!(read_json::<Vec<String>>(&path).unwrap().is_none());
        write_json(&path, &vec!["x".to_string()]).unwrap();
        assert_eq!(read_json::<Vec<String>>(&path).unwrap().unwrap(), vec!["x"]);
        assert!(!write_json(&path, &vec!["x".to_string()]).unwrap());
    }
}
