//! Persistence of claim histories.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::history::PersistedHistory;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid schedule key for storage: '{0}'")]
    InvalidKey(String),
}

/// Loads and saves one [`PersistedHistory`] per schedule key.
pub trait HistoryStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved for the schedule yet.
    fn load(&self, schedule_key: &str) -> Result<Option<PersistedHistory>, StoreError>;

    fn save(&self, schedule_key: &str, history: &PersistedHistory) -> Result<(), StoreError>;
}

/// File-based history store: one JSON file per schedule.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create the store, ensuring the directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "history store initialized");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn history_path(&self, schedule_key: &str) -> Result<PathBuf, StoreError> {
        let valid = !schedule_key.is_empty()
            && !schedule_key.starts_with('.')
            && !schedule_key.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidKey(schedule_key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", schedule_key)))
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self, schedule_key: &str) -> Result<Option<PersistedHistory>, StoreError> {
        let path = self.history_path(schedule_key)?;
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path)?;
        match serde_json::from_str::<PersistedHistory>(&data) {
            Ok(history) => {
                debug!(schedule = %schedule_key, claims = history.keys.len(), "loaded claim history");
                Ok(Some(history))
            }
            Err(e) => {
                warn!(
                    schedule = %schedule_key,
                    path = %path.display(),
                    error = %e,
                    "corrupt claim history, starting empty"
                );
                Ok(None)
            }
        }
    }

    /// Writes to a dot-prefixed `.tmp` sibling, then renames over the target.
    fn save(&self, schedule_key: &str, history: &PersistedHistory) -> Result<(), StoreError> {
        let path = self.history_path(schedule_key)?;
        let tmp_path = self.dir.join(format!(".{}.tmp", schedule_key));

        let data = serde_json::to_string_pretty(history)?;
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;

        debug!(schedule = %schedule_key, claims = history.keys.len(), "saved claim history");
        Ok(())
    }
}

/// In-process store, for tests and ephemeral registries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    histories: RwLock<HashMap<String, PersistedHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a history as if it had been saved earlier.
    pub fn with_history(self, schedule_key: impl Into<String>, history: PersistedHistory) -> Self {
        self.histories
            .write()
            .expect("history store lock poisoned")
            .insert(schedule_key.into(), history);
        self
    }

    pub fn len(&self) -> usize {
        self.histories.read().expect("history store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self, schedule_key: &str) -> Result<Option<PersistedHistory>, StoreError> {
        Ok(self
            .histories
            .read()
            .expect("history store lock poisoned")
            .get(schedule_key)
            .cloned())
    }

    fn save(&self, schedule_key: &str, history: &PersistedHistory) -> Result<(), StoreError> {
        self.histories
            .write()
            .expect("history store lock poisoned")
            .insert(schedule_key.to_string(), history.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use tempfile::TempDir;

    use super::*;

    fn sample() -> PersistedHistory {
        PersistedHistory {
            keys: vec!["day-1".into(), "day-2".into()],
            timestamps: vec![
                DateTime::<Utc>::UNIX_EPOCH,
                DateTime::<Utc>::UNIX_EPOCH + Duration::hours(20),
            ],
        }
    }

    #[test]
    fn json_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("history")).unwrap();

        assert!(store.load("daily-login").unwrap().is_none());
        store.save("daily-login", &sample()).unwrap();

        assert_eq!(store.load("daily-login").unwrap(), Some(sample()));
        assert!(store.dir().join("daily-login.json").exists());
        assert!(!store.dir().join(".daily-login.tmp").exists());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("daily-login.json"), "{ not json").unwrap();

        assert!(store.load("daily-login").unwrap().is_none());
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        for key in ["", "../escape", ".hidden", "a\\b"] {
            assert!(
                matches!(store.save(key, &sample()), Err(StoreError::InvalidKey(_))),
                "key {key:?}"
            );
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new().with_history("seeded", sample());
        assert_eq!(store.load("seeded").unwrap(), Some(sample()));
        assert!(store.load("other").unwrap().is_none());

        store.save("other", &PersistedHistory::default()).unwrap();
        assert_eq!(store.len(), 2);
    }
}
