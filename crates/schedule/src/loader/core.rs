//! Core [`ScheduleLoader`] struct: filesystem-backed schedule loading with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::schema::ScheduleDocument;

use super::error::{CatalogError, LoadResult, LoadStatus, Result};
use super::watcher::handle_fs_event;

/// A loaded schedule: its source document, built config, and file of origin.
#[derive(Debug, Clone)]
pub(super) struct CatalogEntry {
    pub(super) document: ScheduleDocument,
    pub(super) config: Arc<ScheduleConfig>,
    pub(super) path: PathBuf,
}

pub(super) type SharedEntries = Arc<RwLock<HashMap<String, CatalogEntry>>>;

/// Filesystem-backed schedule catalog with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, parses them
/// into [`ScheduleDocument`]s, validates each into an immutable
/// [`ScheduleConfig`], and keeps an in-memory map keyed by schedule id.
pub struct ScheduleLoader {
    /// Root directory containing schedule YAML files.
    schedules_dir: PathBuf,
    entries: SharedEntries,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl ScheduleLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(schedules_dir: PathBuf) -> Self {
        if !schedules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&schedules_dir) {
                warn!(path = %schedules_dir.display(), error = %e, "failed to create schedules directory");
            }
        }
        Self {
            schedules_dir,
            entries: Arc::new(RwLock::new(HashMap::new())),
            _watcher: None,
        }
    }

    /// Recursively scan the schedules directory and load all YAML files.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse and validation errors
    /// are reported per-file but do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.schedules_dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let path = entry?.path();

            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(document) => {
                    let schedule_id = document.metadata.id.clone();
                    match self.insert_document(document, &path) {
                        Ok(()) => {
                            info!(schedule = %schedule_id, path = %path.display(), "loaded schedule");
                            results.push(LoadResult {
                                path,
                                status: LoadStatus::Loaded { schedule_id },
                            });
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "rejected schedule file");
                            results.push(LoadResult {
                                path,
                                status: LoadStatus::Failed { error: e.to_string() },
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load schedule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed { error: e.to_string() },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse a single YAML file and validate it into a buildable schedule.
    pub fn load_file(&self, path: &Path) -> Result<ScheduleDocument> {
        let contents = fs::read_to_string(path)?;
        parse_document(&contents)
    }

    /// Build the config for a document and store both. Rejects an id already
    /// owned by a different file.
    fn insert_document(&self, document: ScheduleDocument, path: &Path) -> Result<()> {
        let config = Arc::new(document.to_config()?);
        let id = document.metadata.id.clone();
        let mut entries = self.entries.write().expect("schedule entries lock poisoned");
        if let Some(existing) = entries.get(&id) {
            if existing.path != path {
                return Err(CatalogError::Validation(format!(
                    "duplicate schedule id '{}' (already loaded from {})",
                    id,
                    existing.path.display()
                )));
            }
        }
        entries.insert(
            id,
            CatalogEntry {
                document,
                config,
                path: path.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Start a filesystem watcher with 500ms poll interval.
    ///
    /// On file create/modify the schedule is re-parsed and upserted.
    /// On file delete the schedule is removed from the in-memory map.
    /// Parse errors are logged as warnings; the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let entries = Arc::clone(&self.entries);

        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => handle_fs_event(&event, &entries),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;

        watcher.watch(&self.schedules_dir, RecursiveMode::Recursive)?;

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.schedules_dir.display(), "watching schedules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    /// Get the schedules directory path.
    pub fn schedules_dir(&self) -> &Path {
        &self.schedules_dir
    }

    /// Built config for a schedule id, enabled or not.
    pub fn get(&self, id: &str) -> Option<Arc<ScheduleConfig>> {
        self.entries
            .read()
            .expect("schedule entries lock poisoned")
            .get(id)
            .map(|e| Arc::clone(&e.config))
    }

    /// Raw document for a schedule id.
    pub fn document(&self, id: &str) -> Option<ScheduleDocument> {
        self.entries
            .read()
            .expect("schedule entries lock poisoned")
            .get(id)
            .map(|e| e.document.clone())
    }

    /// All enabled schedules, sorted by key.
    pub fn enabled_schedules(&self) -> Vec<Arc<ScheduleConfig>> {
        let entries = self.entries.read().expect("schedule entries lock poisoned");
        let mut configs: Vec<_> = entries
            .values()
            .filter(|e| e.document.metadata.enabled)
            .map(|e| Arc::clone(&e.config))
            .collect();
        configs.sort_by(|a, b| a.key().cmp(b.key()));
        configs
    }

    /// Number of loaded documents (enabled and disabled).
    pub fn len(&self) -> usize {
        self.entries.read().expect("schedule entries lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically write a schedule document to a YAML file.
    ///
    /// Writes to a `.tmp` file first, then renames to the final path to
    /// avoid partial writes on crash. The document must validate first.
    pub fn write_document(&self, document: &ScheduleDocument) -> Result<PathBuf> {
        document.to_config()?;

        let id = &document.metadata.id;
        let final_path = self.schedules_dir.join(format!("{}.yml", id));
        let tmp_path = self.schedules_dir.join(format!(".{}.tmp", id));

        let yaml = document.to_yaml()?;
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(schedule = %id, path = %final_path.display(), "wrote schedule file");

        self.insert_document(document.clone(), &final_path)?;
        Ok(final_path)
    }

    /// Delete a schedule file by id, removing both the file and the in-memory entry.
    pub fn delete_schedule(&self, id: &str) -> Result<()> {
        let path = self
            .entries
            .read()
            .expect("schedule entries lock poisoned")
            .get(id)
            .map(|e| e.path.clone())
            .ok_or_else(|| CatalogError::Validation(format!("no schedule loaded with id '{}'", id)))?;

        fs::remove_file(&path)?;
        self.entries
            .write()
            .expect("schedule entries lock poisoned")
            .remove(id);

        info!(schedule = %id, "deleted schedule");
        Ok(())
    }
}

/// Parse YAML into a document and reject empty ids up front.
pub(super) fn parse_document(contents: &str) -> Result<ScheduleDocument> {
    let document: ScheduleDocument = serde_yaml::from_str(contents)?;
    if document.metadata.id.trim().is_empty() {
        return Err(CatalogError::Validation(
            "schedule metadata.id must not be empty".to_string(),
        ));
    }
    Ok(document)
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
