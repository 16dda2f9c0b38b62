use std::collections::HashMap;
use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;

/// Key-value settings store the registry persists its active set into.
///
/// The store is an external collaborator: the engine only needs
/// get-by-name and upsert-by-name. Calls are synchronous and bounded;
/// failures surface to the caller without retry.
pub trait SettingsStore: Send + Sync + Debug {
    /// Get the name of this store
    fn name(&self) -> &str;

    /// Read a setting, `None` when it was never written
    fn get(&self, name: &str) -> Result<Option<Value>>;

    /// Insert or replace a setting
    fn upsert(&self, name: &str, value: Value) -> Result<()>;
}

/// In-memory settings store
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(operation: &str) -> StorageSystemError {
        StorageSystemError::StoreFailed {
            store: "memory".to_string(),
            operation: operation.to_string(),
            message: "settings lock poisoned".to_string(),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, name: &str) -> Result<Option<Value>> {
        let values = self.values.lock().map_err(|_| Self::poisoned("get"))?;
        Ok(values.get(name).cloned())
    }

    fn upsert(&self, name: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| Self::poisoned("upsert"))?;
        values.insert(name.to_string(), value);
        Ok(())
    }
}

/// Settings store backed by a single JSON object file.
///
/// Every upsert rewrites the whole file through a temporary file in the
/// same directory that is then persisted over the target, so readers never
/// observe a half-written document.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| StorageSystemError::io(e, "read_settings", self.path.clone()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            StorageSystemError::DeserializationError {
                format: "json".to_string(),
                source: Box::new(e),
            }
        })?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StorageSystemError::StoreFailed {
                store: self.name().to_string(),
                operation: "read_settings".to_string(),
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }
            .into()),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_settings_dir", parent.clone()))?;

        let contents = serde_json::to_vec_pretty(document).map_err(|e| {
            StorageSystemError::SerializationError {
                format: "json".to_string(),
                source: Box::new(e),
            }
        })?;

        let mut temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.clone()))?;
        temp_file
            .write_all(&contents)
            .map_err(|e| StorageSystemError::io(e, "write_temp_file", temp_file.path().to_path_buf()))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", self.path.clone()))?;
        Ok(())
    }

    fn lock_failed(&self, operation: &str) -> StorageSystemError {
        StorageSystemError::StoreFailed {
            store: self.name().to_string(),
            operation: operation.to_string(),
            message: "write lock poisoned".to_string(),
        }
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn name(&self) -> &str {
        "json-file"
    }

    fn get(&self, name: &str) -> Result<Option<Value>> {
        let _guard = self.write_lock.lock().map_err(|_| self.lock_failed("get"))?;
        let mut document = self.read_document()?;
        Ok(document.remove(name))
    }

    fn upsert(&self, name: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| self.lock_failed("upsert"))?;
        let mut document = self.read_document()?;
        document.insert(name.to_string(), value);
        self.write_document(&document)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
