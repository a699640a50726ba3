//! Key-value persistence backends
//!
//! Best scores and settings are small JSON documents stored under fixed keys.
//! On the web they live in LocalStorage; natively in one file per key.

use std::collections::HashMap;

use crate::error::EngineError;

/// String key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), EngineError>;
    fn remove(&mut self, key: &str) -> Result<(), EngineError>;
}

/// Volatile store (tests, headless runs)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), EngineError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temp file first and are renamed over the old value.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<std::path::PathBuf, EngineError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(EngineError::Storage(format!("invalid key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        std::fs::read_to_string(path).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), EngineError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
