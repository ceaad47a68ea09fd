//! Key-value persistence for the collection.
//!
//! Four entries are kept: the full record array, the gray-literature array,
//! the last-update timestamp and the funnel counts of the last ingestion run.
//! [`FileStore`] writes each entry to its own JSON file under a data directory
//! (`~/.livingreview` by default).

use crate::error::{ReviewError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serialized record array, most recent first
pub const PAPERS_KEY: &str = "living_review_papers";
/// Serialized gray-literature record array
pub const GRAY_KEY: &str = "living_review_gray";
/// RFC 3339 timestamp of the last successful update
pub const LAST_UPDATE_KEY: &str = "living_review_last_update";
/// Serialized `IngestionDiagnostics` of the most recent run
pub const LAST_RUN_KEY: &str = "living_review_last_run";

/// Minimal string store the collection persists through.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Default data directory: `~/.livingreview`
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".livingreview"))
        .ok_or_else(|| ReviewError::Config("Cannot determine home directory".to_string()))
}

/// One file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the default data directory
    pub fn new() -> Result<Self> {
        Self::with_dir(default_data_dir()?)
    }

    /// Open (and create if needed) a custom data directory
    pub fn with_dir(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            ReviewError::Storage(format!("Cannot create data directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ReviewError::Storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!(key = key, "Storage entry not found");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(content))
    }

    /// Write to a sibling temp file and rename over the target, so a crash
    /// mid-write leaves the previous value intact.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key = key, bytes = value.len(), "Wrote storage entry");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!(key = key, "Removed storage entry");
        }
        Ok(())
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_entry() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::with_dir(dir.path().to_path_buf())?;
        assert_eq!(store.get(PAPERS_KEY)?, None);
        Ok(())
    }

    #[test]
    fn test_set_get_remove() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = FileStore::with_dir(dir.path().join("nested"))?;

        store.set(LAST_UPDATE_KEY, "2025-01-01T00:00:00Z")?;
        assert_eq!(store.get(LAST_UPDATE_KEY)?.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert!(store.dir().join("living_review_last_update.json").exists());

        store.set(LAST_UPDATE_KEY, "2025-02-01T00:00:00Z")?;
        assert_eq!(store.get(LAST_UPDATE_KEY)?.as_deref(), Some("2025-02-01T00:00:00Z"));

        store.remove(LAST_UPDATE_KEY)?;
        assert_eq!(store.get(LAST_UPDATE_KEY)?, None);
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_keys() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = FileStore::with_dir(dir.path().to_path_buf())?;
        assert!(matches!(store.set("../escape", "x"), Err(ReviewError::Storage(_))));
        Ok(())
    }

    #[test]
    fn test_memory_store() -> Result<()> {
        let mut store = MemoryStore::new();
        store.set(GRAY_KEY, "[]")?;
        assert_eq!(store.get(GRAY_KEY)?.as_deref(), Some("[]"));
        store.remove(GRAY_KEY)?;
        assert_eq!(store.get(GRAY_KEY)?, None);
        Ok(())
    }
}
