// Per-document sync status and conflict heuristics shared by engine and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether an open document's content is synchronized with the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Synced,
    OutOfDate,
    Syncing,
    Conflict,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::OutOfDate => "out-of-date",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }

    /// `conflict` and `error` are only left through explicit user action.
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Conflict | SyncStatus::Error)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MARKER_OURS: &str = "<<<<<<<";
const MARKER_SEPARATOR: &str = "=======";
const MARKER_THEIRS: &str = ">>>>>>>";

/// True when `content` carries an unresolved three-way merge block: a line
/// starting with `<<<<<<<`, followed later by `=======` and `>>>>>>>` lines.
pub fn has_conflict_markers(content: &str) -> bool {
    let mut stage = 0u8;
    for line in content.lines() {
        match stage {
            0 if line.starts_with(MARKER_OURS) => stage = 1,
            1 if line.starts_with(MARKER_SEPARATOR) => stage = 2,
            2 if line.starts_with(MARKER_THEIRS) => return true,
            _ => {}
        }
    }
    false
}

/// Fallback conflict detection on git's error text.
pub fn error_indicates_conflict(message: &str) -> bool {
    if message.contains("CONFLICT") {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("conflict") || lower.contains("merge")
}
