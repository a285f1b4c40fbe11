// `git status --porcelain=v1 -z` parsing.

use serde::Serialize;

/// One path reported by porcelain status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Index (staged) status code, `X` in `XY`.
    pub index: char,
    /// Worktree status code, `Y` in `XY`.
    pub worktree: char,
    pub path: String,
    /// Source path for renames and copies.
    pub original_path: Option<String>,
}

impl StatusEntry {
    /// Unmerged per git-status(1): `DD AU UD UA DU AA UU`.
    pub fn is_unmerged(&self) -> bool {
        matches!(
            (self.index, self.worktree),
            ('D', 'D') | ('A', 'A') | ('U', _) | (_, 'U')
        )
    }

    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    pub entries: Vec<StatusEntry>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for(&self, path: &str) -> Option<&StatusEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    pub fn unmerged_paths(&self) -> Vec<&str> {
        self.entries.iter().filter(|e| e.is_unmerged()).map(|e| e.path.as_str()).collect()
    }

    pub fn has_unmerged(&self) -> bool {
        self.entries.iter().any(StatusEntry::is_unmerged)
    }
}

/// Parse NUL-separated porcelain v1 output. Returns `None` on malformed input.
pub fn parse_porcelain_z(output: &str) -> Option<GitStatus> {
    let mut entries = Vec::new();
    let mut records = output.split('\0').filter(|record| !record.is_empty());

    while let Some(record) = records.next() {
        let mut chars = record.chars();
        let index = chars.next()?;
        let worktree = chars.next()?;
        if chars.next() != Some(' ') {
            return None;
        }
        let path = chars.as_str().to_string();
        if path.is_empty() {
            return None;
        }
        let original_path = if matches!(index, 'R' | 'C') {
            Some(records.next()?.to_string())
        } else {
            None
        };
        entries.push(StatusEntry { index, worktree, path, original_path });
    }

    Some(GitStatus { entries })
}
