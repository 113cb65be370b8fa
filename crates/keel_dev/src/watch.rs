//! File watcher adapter.
//!
//! Translates `notify` events into [`ChangeEvent`]s on an `mpsc` channel.
//! Nothing else in the crate depends on `notify`; tests feed the channel
//! directly.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::DevError;
use crate::event::{ChangeEvent, ChangeKind};

/// A running watcher. Events stop when it is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watches every existing directory in `roots` recursively and forwards
    /// changes to `tx`. Paths below any of `ignored` are dropped.
    pub fn start(roots: &[PathBuf], ignored: Vec<PathBuf>, tx: Sender<ChangeEvent>) -> Result<Self, DevError> {
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in translate(&event) {
                        if ignored.iter().any(|dir| change.path.starts_with(dir)) {
                            continue;
                        }
                        // The receiver is gone once the session stops.
                        let _ = tx.send(change);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            },
            Config::default(),
        )
        .map_err(|e| watch_error(Path::new("."), e))?;

        let mut watched = Vec::new();
        for root in roots.iter().filter(|r| r.is_dir()) {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| watch_error(root, e))?;
            watched.push(root.clone());
        }
        tracing::debug!(roots = ?watched, "watching for changes");
        Ok(Self {
            _watcher: watcher,
            roots: watched,
        })
    }

    /// Directories being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn watch_error(path: &Path, e: notify::Error) -> DevError {
    DevError::Watch {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Maps one raw event to change events. Access and metadata-only events
/// are dropped; a rename becomes a deletion of the old path and a creation
/// of the new one.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Create(_) => vec![ChangeKind::Created],
        EventKind::Remove(_) => vec![ChangeKind::Deleted],
        EventKind::Modify(ModifyKind::Metadata(_)) => vec![],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![ChangeKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![ChangeKind::Created],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            return rename_both(&event.paths);
        }
        EventKind::Modify(_) => vec![ChangeKind::Modified],
        EventKind::Access(_) | EventKind::Any | EventKind::Other => vec![],
    };
    event
        .paths
        .iter()
        .flat_map(|path| {
            kinds.iter().map(move |&kind| ChangeEvent {
                path: path.clone(),
                kind,
            })
        })
        .collect()
}

fn rename_both(paths: &[PathBuf]) -> Vec<ChangeEvent> {
    match paths {
        [from, to] => vec![ChangeEvent::deleted(from), ChangeEvent::created(to)],
        _ => paths.iter().map(ChangeEvent::modified).collect(),
    }
}
