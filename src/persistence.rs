//! Key-value preference store
//!
//! A flat JSON object on disk, one key per setting. Reads never fail from the
//! caller's point of view (a broken file reads as empty); writes log and return
//! the error so callers can decide whether to care.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub trait KeyValueStore {
    /// `None` when the key is absent
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn keys(&self) -> Vec<String>;
}

/// Store backed by `$XDG_CONFIG_HOME/edge-dock/config.json`
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Default store location
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Open the store at `path`. A missing or unparsable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => {
                    info!(path = %path.display(), keys = map.len(), "Loaded preference store");
                    map
                }
                Ok(other) => {
                    warn!(path = %path.display(), found = ?other, "Preference store is not a JSON object, starting empty");
                    Map::new()
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse preference store, starting empty");
                    Map::new()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No preference store yet");
                Map::new()
            }
        };
        Self { path, values }
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create store directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(&self.values)
            .context("Failed to serialize preference store")?;
        fs::write(&self.path, contents)
            .context(format!("Failed to write preference store to {}", self.path.display()))?;
        Ok(())
    }

    fn flush_logged(&self, key: &str) -> Result<()> {
        self.flush()
            .inspect_err(|e| error!(key = %key, error = ?e, "Failed to persist preference"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush_logged(key)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush_logged(key)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.flush_logged("*")
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Non-persistent store for tests and for running without a writable config dir
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}
