//! JSON document helpers.
//!
//! Reads never fail: a missing file yields the default shape and a corrupt
//! file is logged and replaced by the default. Writes go to a sibling
//! temporary file that is renamed over the target once complete.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// Outcome of reading a document, kept so callers can tell defaults apart
#[derive(Debug)]
pub enum Loaded<T> {
    Parsed(T),
    Missing,
    Corrupt(AppError),
}

/// Read and parse a JSON document without deciding on a fallback
pub fn read<T: DeserializeOwned>(path: &Path) -> Loaded<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Loaded::Missing,
        Err(e) => {
            return Loaded::Corrupt(AppError::ConfigCorrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Loaded::Parsed(value),
        Err(e) => Loaded::Corrupt(AppError::ConfigCorrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

/// Read a document, substituting the default when missing or corrupt
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read(path) {
        Loaded::Parsed(value) => value,
        Loaded::Missing => {
            debug!("{} not found, using defaults", path.display());
            T::default()
        }
        Loaded::Corrupt(e) => {
            warn!("{}; replacing with defaults", e);
            T::default()
        }
    }
}

/// Temporary sibling used while a document is being written
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize pretty-printed and atomically replace the target
pub async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let contents = serde_json::to_string_pretty(value)?;
    write_text_atomic(path, &contents).await
}

/// Atomically replace a text file with new contents
pub async fn write_text_atomic(path: &Path, contents: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let temp = temp_path(path);
    tokio::fs::write(&temp, contents).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn test_missing_and_corrupt_yield_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(read_or_default::<Doc>(&missing), Doc::default());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{\"value\":").unwrap();
        assert!(matches!(read::<Doc>(&corrupt), Loaded::Corrupt(_)));
        assert_eq!(read_or_default::<Doc>(&corrupt), Doc::default());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_atomic(&path, &Doc { value: 7 }).await.unwrap();

        assert_eq!(read_or_default::<Doc>(&path), Doc { value: 7 });
        assert!(!temp_path(&path).exists());
        assert_eq!(temp_path(&path).file_name().unwrap(), "doc.json.tmp");
    }
}
