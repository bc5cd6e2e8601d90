//! Watermark storage.
//!
//! The watermark is the timestamp of the most recently exported sample for a
//! company/asset pair. Stores hold string values by key, like a cache would;
//! the aggregator owns parsing and the monotonic update rule.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Key under which the last exported sample timestamp is stored.
pub const WATERMARK_KEY: &str = "last_exported_timestamp";

/// Capability to read and write scalar values by key.
pub trait WatermarkStore {
    fn get(&self, key: &str) -> Result<Option<String>, WatermarkError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), WatermarkError>;
}

/// Watermark store errors.
#[derive(Debug)]
pub enum WatermarkError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for WatermarkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkError::Io(e) => write!(f, "IO error: {e}"),
            WatermarkError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for WatermarkError {}

impl From<std::io::Error> for WatermarkError {
    fn from(err: std::io::Error) -> Self {
        WatermarkError::Io(err)
    }
}

/// In-process store. Values live as long as the store does.
#[derive(Debug, Default, Clone)]
pub struct MemoryWatermarkStore {
    values: HashMap<String, String>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `key` already set.
    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        let mut store = Self::new();
        store.values.insert(key.to_string(), value.into());
        store
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, key: &str) -> Result<Option<String>, WatermarkError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), WatermarkError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file shared by all company/asset scopes.
///
/// Keys are stored as `{company_id}/{asset_id}/{key}`. The file is re-read on
/// every access so separate invocations see each other's writes.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
    scope: String,
}

impl FileWatermarkStore {
    /// Open the store at `path`, scoped to one company/asset pair.
    pub fn new(path: impl Into<PathBuf>, company_id: i64, asset_id: i64) -> Self {
        Self {
            path: path.into(),
            scope: format!("{company_id}/{asset_id}"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}/{}", self.scope, key)
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, WatermarkError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| WatermarkError::Parse(e.to_string()))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), WatermarkError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(values)
            .map_err(|e| WatermarkError::Parse(e.to_string()))?;

        // Write to a sibling file first so readers never see a partial map.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn get(&self, key: &str) -> Result<Option<String>, WatermarkError> {
        Ok(self.read_all()?.remove(&self.scoped_key(key)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), WatermarkError> {
        let mut values = self.read_all()?;
        values.insert(self.scoped_key(key), value.to_string());
        self.write_all(&values)
    }
}
