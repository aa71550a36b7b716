use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde_json::Value;


#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable key/value store holding JSON documents.
///
/// Writes replace the whole document stored under a key.
pub trait PreferenceStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;
}

pub type StorageHandle = Arc<dyn PreferenceStorage>;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle() -> StorageHandle {
        Arc::new(Self::new())
    }
}

impl PreferenceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// File name for a storage key. Distinct keys always get distinct names, also on
/// case-insensitive file systems: `[a-z0-9._-]` is kept and every other byte,
/// including upper-case letters, becomes `%XX`.
fn file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(char::from(byte)),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

impl PreferenceStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        let payload = match fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                key: key.to_string(),
                source,
            })
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let payload = serde_json::to_string_pretty(value).map_err(|source| StorageError::Decode {
            key: key.to_string(),
            source,
        })?;
        // readers never observe a partially written document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_storage_round_trips() {
        let storage = MemoryStorage::new();
        assert!(storage.get("grid-columns:users").unwrap().is_none());
        storage.set("grid-columns:users", &json!({"version": 1})).unwrap();
        assert_eq!(
            storage.get("grid-columns:users").unwrap(),
            Some(json!({"version": 1}))
        );
    }

    #[test]
    fn file_storage_writes_one_document_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("grid-columns:users", &json!({"version": 2})).unwrap();
        storage.set("grid-columns:logs", &json!({"version": 3})).unwrap();
        assert_eq!(
            storage.get("grid-columns:users").unwrap(),
            Some(json!({"version": 2}))
        );
        assert_eq!(
            storage.get("grid-columns:logs").unwrap(),
            Some(json!({"version": 3}))
        );
        assert!(storage.get("grid-columns:missing").unwrap().is_none());
    }

    #[test]
    fn file_names_keep_keys_apart() {
        assert_eq!(file_stem("grid-columns:runs"), "grid-columns%3Aruns");
        assert_eq!(file_stem("grid-columns:Users"), "grid-columns%3A%55sers");
        assert_eq!(file_stem("a/b"), "a%2Fb");
        assert_ne!(file_stem("grid-columns:a:b"), file_stem("grid-columns:a_b"));
        assert_ne!(file_stem("Users"), file_stem("users"));
        assert_ne!(file_stem("%55"), file_stem("U"));
    }

    #[test]
    fn file_storage_keys_differing_in_case_stay_independent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("grid-columns:Users", &json!({"version": 1})).unwrap();
        storage.set("grid-columns:users", &json!({"version": 2})).unwrap();
        storage.set("grid-columns:a:b", &json!({"version": 3})).unwrap();
        assert_eq!(
            storage.get("grid-columns:Users").unwrap(),
            Some(json!({"version": 1}))
        );
        assert_eq!(
            storage.get("grid-columns:users").unwrap(),
            Some(json!({"version": 2}))
        );
        assert!(storage.get("grid-columns:a_b").unwrap().is_none());
    }

    #[test]
    fn file_storage_reports_corrupt_documents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        fs::write(storage.path_for("broken"), "{not json").unwrap();
        assert!(matches!(
            storage.get("broken"),
            Err(StorageError::Decode { .. })
        ));
    }
}
