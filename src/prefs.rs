//! Local preference persistence
//!
//! Two string keys survive restarts: the selected division and the
//! notifications flag. A store that cannot be read or written never stops the
//! app; it logs and keeps working from memory.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DIVISION_KEY: &str = "division";
pub const NOTIFICATIONS_KEY: &str = "notifications";

pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    /// Best-effort write; failures are swallowed by the store
    fn set(&mut self, key: &str, value: &str);
}

/// Keeps preferences for the current session only
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Preferences in a small JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::load(&path) {
            Ok(values) => values,
            Err(e) => {
                warn!("Preferences unavailable, using defaults: {:#}", e);
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            debug!("No preference file at {}", path.display());
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.values).context("Failed to encode preferences")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save() {
            warn!("Preference '{}' kept in memory only: {:#}", key, e);
        }
    }
}
