// Sync: per-document status transitions, the workspace pull/commit/push
// cycle, and the periodic auto-sync timer.

pub mod auto;
pub mod orchestrator;
pub mod tracker;

use serde::{Deserialize, Serialize};

pub use auto::{start_auto_sync, AutoSyncHandle};
pub use orchestrator::{SyncError, SyncOrchestrator, SyncOutcome, SyncSettings};
pub use tracker::{initial_status, next_status, InvalidTransition, SyncEvent};

/// What started a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Explicit user request.
    Manual,
    /// The auto-sync interval elapsed.
    Timer,
}
