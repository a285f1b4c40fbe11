// Per-document sync status state machine.
//
//   synced ──edit──▶ out-of-date ──cycle──▶ syncing ──▶ synced | conflict | error
//
// `conflict` and `error` are only left through an explicit user action
// (discard, restore, or a manual sync retry from `error`).

use quire_common::sync::{has_conflict_markers, SyncStatus};
use thiserror::Error;

use super::SyncTrigger;
use crate::git::StatusEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Content now differs from the snapshot taken at the last successful sync.
    LocalEdit,
    CycleStarted { trigger: SyncTrigger },
    /// A cycle refused to run because the document has unsaved edits and
    /// auto-save is off.
    UnsavedEditsBlocked,
    /// A cycle refused to run because git reports an unresolved merge or the
    /// document's changes still carry conflict markers.
    ConflictDetected,
    CycleConflict,
    CycleFailed,
    CycleSucceeded,
    /// Discard or restore completed; `dirty` when the working tree still
    /// differs from the last commit.
    UserResolved { dirty: bool },
    /// Restore failed part-way, leaving an uncommitted change.
    RestoreFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid sync transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: SyncStatus,
    pub event: SyncEvent,
}

pub fn next_status(current: SyncStatus, event: SyncEvent) -> Result<SyncStatus, InvalidTransition> {
    use SyncStatus::{Conflict, Error, OutOfDate, Synced, Syncing};

    let next = match (current, event) {
        (Synced | OutOfDate, SyncEvent::LocalEdit) => OutOfDate,
        (Conflict | Error, SyncEvent::LocalEdit) => current,

        (Synced | OutOfDate, SyncEvent::CycleStarted { .. }) => Syncing,
        (Error, SyncEvent::CycleStarted { trigger: SyncTrigger::Manual }) => Syncing,

        (Synced | OutOfDate | Error, SyncEvent::UnsavedEditsBlocked) => Conflict,
        (Synced | OutOfDate | Conflict | Error, SyncEvent::ConflictDetected) => Conflict,

        (Syncing, SyncEvent::CycleConflict) => Conflict,
        (Syncing, SyncEvent::CycleFailed) => Error,
        (Syncing, SyncEvent::CycleSucceeded) => Synced,

        (Synced | OutOfDate | Conflict | Error, SyncEvent::UserResolved { dirty: true }) => OutOfDate,
        (Synced | OutOfDate | Conflict | Error, SyncEvent::UserResolved { dirty: false }) => Synced,
        (Synced | OutOfDate | Conflict | Error, SyncEvent::RestoreFailed) => Error,

        (from, event) => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}

/// Status for a document being opened, from its git status entry (`None`
/// when clean) and on-disk content.
pub fn initial_status(entry: Option<&StatusEntry>, content: &str) -> SyncStatus {
    match entry {
        Some(entry) if entry.is_unmerged() => SyncStatus::Conflict,
        _ if has_conflict_markers(content) => SyncStatus::Conflict,
        Some(_) => SyncStatus::OutOfDate,
        None => SyncStatus::Synced,
    }
}
