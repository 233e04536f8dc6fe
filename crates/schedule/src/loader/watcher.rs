//! Filesystem event handler for the notify watcher (hot-reload).

use std::fs;
use std::path::Path;
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{is_dotfile, is_yaml, parse_document, CatalogEntry, SharedEntries};

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, entries: &SharedEntries) {
    for path in &event.paths {
        // Skips our own .tmp files too.
        if !is_yaml(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => reload_file(path, entries),
            EventKind::Remove(RemoveKind::File) => remove_by_path(path, entries),
            _ => {}
        }
    }
}

fn reload_file(path: &Path, entries: &SharedEntries) {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read file during hot-reload");
            return;
        }
    };

    let parsed = parse_document(&contents)
        .and_then(|document| document.to_config().map(|config| (document, config)));

    match parsed {
        Ok((document, config)) => {
            let id = document.metadata.id.clone();
            info!(schedule = %id, path = %path.display(), "hot-reloaded schedule");
            entries.write().expect("schedule entries lock poisoned").insert(
                id,
                CatalogEntry {
                    document,
                    config: Arc::new(config),
                    path: path.to_path_buf(),
                },
            );
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to parse schedule during hot-reload, keeping previous version"
            );
        }
    }
}

fn remove_by_path(path: &Path, entries: &SharedEntries) {
    let mut guard = entries.write().expect("schedule entries lock poisoned");
    let id = guard
        .iter()
        .find(|(_, entry)| entry.path == path)
        .map(|(id, _)| id.clone());
    if let Some(id) = id {
        guard.remove(&id);
        info!(schedule = %id, path = %path.display(), "removed schedule after file deletion");
    }
}
