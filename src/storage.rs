//! Durable string-keyed storage for learner progress.
//!
//! The file store keeps every key in one JSON object on disk and rewrites it
//! (temp file + rename) on every change. Values are opaque strings; callers
//! store JSON text in them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage encoding error: {0}")]
  Encode(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Volatile store; used by tests and when no data path can be opened.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
  entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
    self.entries.insert(key.to_string(), value);
    Ok(())
  }
}

#[derive(Debug)]
pub struct JsonFileStore {
  path: PathBuf,
  entries: BTreeMap<String, String>,
}

impl JsonFileStore {
  /// Open (or lazily create) the store at `path`.
  /// A missing file is empty; an unreadable or corrupt one is logged and treated as empty.
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let entries = match std::fs::read_to_string(&path) {
      Ok(s) => match serde_json::from_str::<BTreeMap<String, String>>(&s) {
        Ok(m) => {
          info!(target: "progress", path = %path.display(), keys = m.len(), "Loaded progress file");
          m
        }
        Err(e) => {
          warn!(target: "progress", path = %path.display(), error = %e, "Corrupt progress file; starting from defaults");
          BTreeMap::new()
        }
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        info!(target: "progress", path = %path.display(), "No progress file yet");
        BTreeMap::new()
      }
      Err(e) => {
        warn!(target: "progress", path = %path.display(), error = %e, "Failed to read progress file; starting from defaults");
        BTreeMap::new()
      }
    };
    Self { path, entries }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn flush(&self) -> Result<(), StorageError> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir)?;
    }
    let body = serde_json::to_string_pretty(&self.entries)?;
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, &self.path)?;
    debug!(target: "progress", path = %self.path.display(), keys = self.entries.len(), "Progress file written");
    Ok(())
  }
}

impl KeyValueStore for JsonFileStore {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
    if self.entries.get(key) == Some(&value) {
      return Ok(());
    }
    let previous = self.entries.insert(key.to_string(), value);
    if let Err(e) = self.flush() {
      // Keep memory in step with disk so a retry of the same value rewrites.
      match previous {
        Some(v) => self.entries.insert(key.to_string(), v),
        None => self.entries.remove(key),
      };
      return Err(e);
    }
    Ok(())
  }
}
