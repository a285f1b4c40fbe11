// File watcher: inotify/fsevents → debounce → self-write filter → engine.
// This module handles the first stage: raw FS event detection and filtering.

pub mod debounce;
pub mod mute;
pub mod pipeline;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

pub use mute::{MutedWriter, WriteMutes};
pub use pipeline::{run_pipeline, ExternalChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Remove,
}

/// A raw filesystem event for a single `.md` file (absolute path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

const EVENT_CHANNEL_CAPACITY: usize = 512;

/// Watches a workspace directory for markdown changes with the OS-native
/// backend. Events stop when the watcher is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root` recursively; returns the handle and an event receiver.
    pub fn start(root: &Path) -> Result<(Self, mpsc::Receiver<RawFsEvent>)> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize watch root: {}", root.display()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let filter_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            forward(res, &filter_root, &tx);
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch workspace: {}", root.display()))?;

        debug!(root = %root.display(), "workspace watcher started");
        Ok((Self { _watcher: watcher, root }, rx))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Runs on the notify thread; a closed receiver just drops the event.
fn forward(res: notify::Result<Event>, root: &Path, tx: &mpsc::Sender<RawFsEvent>) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "workspace watcher error");
            return;
        }
    };
    for raw in translate_event(&event, root) {
        if tx.blocking_send(raw).is_err() {
            debug!("change channel closed, dropping watcher events");
            return;
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// Inside the root and not under a hidden directory such as `.git` or `.quire`.
fn is_visible_inside_root(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().all(|component| match component {
        Component::Normal(part) => !part.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn translate_event(event: &Event, root: &Path) -> Vec<RawFsEvent> {
    use notify::event::{ModifyKind, RenameMode};

    let kind = match &event.kind {
        EventKind::Create(_) => FsEventKind::Create,
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            trace!("skipping metadata-only modify event");
            return Vec::new();
        }
        // The old half of a rename looks like a removal to consumers.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsEventKind::Remove,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsEventKind::Create,
        EventKind::Modify(_) => FsEventKind::Modify,
        EventKind::Remove(_) => FsEventKind::Remove,
        _ => {
            trace!(kind = ?event.kind, "skipping non-content event");
            return Vec::new();
        }
    };

    event
        .paths
        .iter()
        .filter(|p| is_markdown(p))
        .filter(|p| {
            if p.starts_with(root) {
                is_visible_inside_root(p, root)
            } else {
                warn!(path = %p.display(), "ignoring event outside watch root (possible symlink escape)");
                false
            }
        })
        .map(|p| RawFsEvent { kind, path: p.clone() })
        .collect()
}
