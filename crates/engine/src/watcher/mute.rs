// Watcher feedback suppression for programmatic writes.
//
// Two signals, either of which marks a watcher event as our own:
// - a short per-path mute held while the write is in flight (bounded by the
//   mute window even if the writer never clears it);
// - the SHA-256 of the last content this process wrote to the path, so an
//   event that arrives after the mute has been cleared is still recognised
//   when the file on disk is byte-identical to what we wrote.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use quire_common::path::DocumentPath;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::workspace::WorkspaceFs;

pub const DEFAULT_MUTE_WINDOW: Duration = Duration::from_millis(500);

/// Lowercase hex SHA-256 of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

#[derive(Debug, Default)]
struct MuteState {
    muted_until: HashMap<DocumentPath, Instant>,
    last_written: HashMap<DocumentPath, String>,
}

#[derive(Debug)]
pub struct WriteMutes {
    window: Duration,
    state: StdMutex<MuteState>,
}

impl Default for WriteMutes {
    fn default() -> Self {
        Self::new(DEFAULT_MUTE_WINDOW)
    }
}

impl WriteMutes {
    pub fn new(window: Duration) -> Self {
        Self { window, state: StdMutex::new(MuteState::default()) }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mute watcher events for `path` for at most the mute window.
    pub fn mute(&self, path: &DocumentPath) {
        let mut state = self.state.lock().expect("write mute lock poisoned");
        state.muted_until.insert(path.clone(), Instant::now() + self.window);
    }

    pub fn unmute(&self, path: &DocumentPath) {
        let mut state = self.state.lock().expect("write mute lock poisoned");
        state.muted_until.remove(path);
    }

    pub fn is_muted(&self, path: &DocumentPath) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().expect("write mute lock poisoned");
        state.muted_until.retain(|_, until| *until > now);
        state.muted_until.contains_key(path)
    }

    /// Remember the content just written to `path`.
    pub fn record_write(&self, path: &DocumentPath, content: &[u8]) {
        let hash = sha256_hex(content);
        let mut state = self.state.lock().expect("write mute lock poisoned");
        state.last_written.insert(path.clone(), hash);
    }

    /// True when `on_disk` is exactly what this process last wrote to `path`.
    pub fn is_self_write(&self, path: &DocumentPath, on_disk: &[u8]) -> bool {
        let state = self.state.lock().expect("write mute lock poisoned");
        state.last_written.get(path).is_some_and(|hash| *hash == sha256_hex(on_disk))
    }

    /// Whether a watcher event for `path` should be dropped.
    pub fn should_ignore(&self, path: &DocumentPath, on_disk: Option<&[u8]>) -> bool {
        self.is_muted(path) || on_disk.is_some_and(|content| self.is_self_write(path, content))
    }

    /// Drop all state for `path` (after a delete or rename away).
    pub fn forget(&self, path: &DocumentPath) {
        let mut state = self.state.lock().expect("write mute lock poisoned");
        state.muted_until.remove(path);
        state.last_written.remove(path);
    }
}

/// The content-write primitive: every programmatic write goes through here.
#[derive(Clone)]
pub struct MutedWriter {
    fs: Arc<dyn WorkspaceFs>,
    mutes: Arc<WriteMutes>,
}

impl MutedWriter {
    pub fn new(fs: Arc<dyn WorkspaceFs>, mutes: Arc<WriteMutes>) -> Self {
        Self { fs, mutes }
    }

    pub fn mutes(&self) -> &Arc<WriteMutes> {
        &self.mutes
    }

    /// Write `content` to `path` (creating directories) with the watcher muted.
    pub async fn write(&self, path: &DocumentPath, content: &str) -> Result<()> {
        self.mutes.mute(path);
        let result = self.fs.write(path, content).await;
        if result.is_ok() {
            self.mutes.record_write(path, content.as_bytes());
        }
        self.mutes.unmute(path);
        trace!(path = %path, ok = result.is_ok(), "muted write finished");
        result
    }
}
