// Workspace sync cycle: save → commit → pull --rebase → push → reconcile tabs.
//
// Every open document that enters `syncing` leaves it before the cycle
// returns. The path locks of every open document and the session lock are
// held for the whole cycle, so user edits and link rewrites queue behind it.
// Nothing is committed while git reports an unresolved merge or a changed
// file still carries conflict markers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quire_common::path::DocumentPath;
use quire_common::sync::{error_indicates_conflict, has_conflict_markers, SyncStatus};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::{SyncEvent, SyncTrigger};
use crate::git::{CommandExecutor, GitHandle, GitOperationError, GitStatus, ProcessCommandExecutor};
use crate::session::{EditorSession, SharedSession};
use crate::watcher::MutedWriter;
use crate::workspace::{PathLocks, WorkspaceFs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub remote: String,
    pub branch: String,
    /// Write unsaved buffers before syncing instead of refusing.
    pub auto_save: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { remote: "origin".to_string(), branch: "main".to_string(), auto_save: true }
    }
}

/// Aggregate result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub committed: bool,
    pub pulled: bool,
    pub pushed: bool,
    pub conflicted_paths: Vec<DocumentPath>,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn new(status: SyncStatus) -> Self {
        Self {
            status,
            committed: false,
            pulled: false,
            pushed: false,
            conflicted_paths: Vec::new(),
            error: None,
        }
    }

    fn conflict(paths: Vec<DocumentPath>) -> Self {
        Self { conflicted_paths: paths, ..Self::new(SyncStatus::Conflict) }
    }

    fn refused(paths: Vec<DocumentPath>, reason: impl Into<String>) -> Self {
        Self { error: Some(reason.into()), ..Self::conflict(paths) }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::new(SyncStatus::Error) }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a sync cycle is already running for this workspace")]
    AlreadyRunning,
}

pub struct SyncOrchestrator<E = ProcessCommandExecutor> {
    git: GitHandle<E>,
    session: SharedSession,
    fs: Arc<dyn WorkspaceFs>,
    writer: MutedWriter,
    locks: Arc<PathLocks>,
    settings: SyncSettings,
    cycle: Mutex<()>,
}

impl<E: CommandExecutor + 'static> SyncOrchestrator<E> {
    pub fn new(
        git: GitHandle<E>,
        session: SharedSession,
        fs: Arc<dyn WorkspaceFs>,
        writer: MutedWriter,
        locks: Arc<PathLocks>,
        settings: SyncSettings,
    ) -> Self {
        Self { git, session, fs, writer, locks, settings, cycle: Mutex::new(()) }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one cycle over every open document.
    ///
    /// Fails only when another cycle is in flight; every other outcome,
    /// including git failures, is reported through [`SyncOutcome::status`].
    pub async fn sync_workspace(
        &self,
        message: &str,
        trigger: SyncTrigger,
    ) -> Result<SyncOutcome, SyncError> {
        let Ok(_cycle) = self.cycle.try_lock() else {
            return Err(SyncError::AlreadyRunning);
        };
        let (_path_guards, mut session) = self.lock_open_documents().await;

        let conflicted = session.paths_with_status(SyncStatus::Conflict);
        if !conflicted.is_empty() {
            info!(count = conflicted.len(), "sync refused: unresolved conflicts");
            return Ok(SyncOutcome::conflict(conflicted));
        }
        if trigger == SyncTrigger::Timer {
            let errored = session.paths_with_status(SyncStatus::Error);
            if !errored.is_empty() {
                debug!(count = errored.len(), "auto-sync skipped: documents need attention");
                return Ok(SyncOutcome::error("documents in error state need attention"));
            }
        }

        let dirty = session.dirty_paths();
        if !dirty.is_empty() {
            if !self.settings.auto_save {
                for path in &dirty {
                    apply(&mut session, path, SyncEvent::UnsavedEditsBlocked);
                }
                info!(count = dirty.len(), "sync refused: unsaved changes with auto-save off");
                return Ok(SyncOutcome::conflict(dirty));
            }
        }

        let changed = match self.working_tree().await {
            Ok((true, status)) => {
                let unmerged = document_paths(status.unmerged_paths());
                info!(unmerged = unmerged.len(), "sync refused: unresolved rebase or merge");
                return Ok(refuse(
                    &mut session,
                    unmerged,
                    "an unresolved rebase or merge is in progress; discard the conflicted files or abort the sync",
                ));
            }
            Ok((false, status)) => changed_markdown(&status),
            Err(error) => {
                warn!(error = %error, "could not read working tree state before sync");
                return Ok(SyncOutcome::error(error.message()));
            }
        };

        if !dirty.is_empty() {
            if let Err(error) = self.save_dirty(&mut session, &dirty).await {
                warn!(error = %format!("{error:#}"), "failed to save before sync");
                return Ok(SyncOutcome::error(format!("{error:#}")));
            }
        }

        let marked = self.files_with_markers(changed.into_iter().chain(dirty)).await;
        if !marked.is_empty() {
            info!(count = marked.len(), "sync refused: conflict markers in changed files");
            return Ok(refuse(&mut session, marked, "changed files still contain conflict markers"));
        }

        let paths = session.paths();
        for path in &paths {
            apply(&mut session, path, SyncEvent::CycleStarted { trigger });
        }

        let remote = self.settings.remote.clone();
        let branch = self.settings.branch.clone();
        let message = message.to_string();
        let result = self
            .git
            .run(move |git| {
                let committed = git.commit_all(&message)?;
                let pulled = git.pull_rebase(&remote, &branch)?;
                let pushed = if git.has_unpushed_commits(&remote, &branch)? {
                    git.push(&remote, &branch)?;
                    true
                } else {
                    false
                };
                Ok((committed, pulled, pushed))
            })
            .await;

        let outcome = match result {
            Ok((committed, pulled, pushed)) => {
                let mut outcome = self.reconcile(&mut session, &paths).await;
                outcome.committed = committed;
                outcome.pulled = pulled;
                outcome.pushed = pushed;
                outcome
            }
            Err(error) => self.fail(&mut session, &paths, error).await,
        };

        info!(
            status = %outcome.status,
            committed = outcome.committed,
            pulled = outcome.pulled,
            pushed = outcome.pushed,
            conflicts = outcome.conflicted_paths.len(),
            "sync cycle finished"
        );
        Ok(outcome)
    }

    /// Path locks of every open document, then the session lock: the same
    /// path → session order that saves and link rewrites use. A document
    /// opened while the path locks were being taken sends us round again.
    async fn lock_open_documents(&self) -> (Vec<OwnedMutexGuard<()>>, MutexGuard<'_, EditorSession>) {
        let mut held: BTreeMap<DocumentPath, OwnedMutexGuard<()>> = BTreeMap::new();
        loop {
            let open = self.session.lock().await.paths();
            for path in open {
                if !held.contains_key(&path) {
                    let guard = self.locks.lock(&path).await;
                    held.insert(path, guard);
                }
            }

            let session = self.session.lock().await;
            if session.paths().iter().all(|path| held.contains_key(path)) {
                return (held.into_values().collect(), session);
            }
            debug!("documents opened while locking; retrying");
        }
    }

    /// Whether a rebase or merge is unresolved, plus the porcelain status.
    async fn working_tree(&self) -> Result<(bool, GitStatus), GitOperationError> {
        self.git
            .run(|git| {
                let status = git.status()?;
                Ok((git.is_rebase_in_progress() || status.has_unmerged(), status))
            })
            .await
    }

    async fn files_with_markers(&self, candidates: impl Iterator<Item = DocumentPath>) -> Vec<DocumentPath> {
        let mut marked = Vec::new();
        for path in candidates.collect::<BTreeSet<_>>() {
            match self.fs.read_to_string(&path).await {
                Ok(content) if has_conflict_markers(&content) => marked.push(path),
                Ok(_) => {}
                Err(error) => debug!(path = %path, error = %format!("{error:#}"), "skipped marker check"),
            }
        }
        marked
    }

    async fn save_dirty(&self, session: &mut EditorSession, dirty: &[DocumentPath]) -> Result<()> {
        for path in dirty {
            let Some(content) = session.get(path).map(|doc| doc.content.clone()) else {
                continue;
            };
            self.writer.write(path, &content).await?;
            let modified = self.fs.modified(path).await.ok().map(DateTime::<Utc>::from);
            session.mark_saved(path, modified)?;
            debug!(path = %path, "saved before sync");
        }
        Ok(())
    }

    /// Clean cycle: pick up pulled content and classify each document.
    async fn reconcile(&self, session: &mut EditorSession, paths: &[DocumentPath]) -> SyncOutcome {
        let mut conflicted = Vec::new();
        let mut errored = Vec::new();

        for path in paths {
            match self.read_with_mtime(path).await {
                Ok((content, modified)) => {
                    let marked = has_conflict_markers(&content);
                    if let Err(error) = session.reload(path, content, modified) {
                        warn!(path = %path, error = %error, "failed to reload after sync");
                    }
                    if marked {
                        apply(session, path, SyncEvent::CycleConflict);
                        conflicted.push(path.clone());
                    } else {
                        apply(session, path, SyncEvent::CycleSucceeded);
                        if let Err(error) = session.mark_snapshot(path) {
                            warn!(path = %path, error = %error, "failed to record sync snapshot");
                        }
                    }
                }
                Err(error) => {
                    warn!(path = %path, error = %format!("{error:#}"), "failed to reload after sync");
                    apply(session, path, SyncEvent::CycleFailed);
                    errored.push(path.clone());
                }
            }
        }

        if !conflicted.is_empty() {
            SyncOutcome::conflict(conflicted)
        } else if !errored.is_empty() {
            SyncOutcome::error(format!("failed to reload {} document(s) after sync", errored.len()))
        } else {
            SyncOutcome::new(SyncStatus::Synced)
        }
    }

    /// Failed cycle: classify as conflict or error and settle every document.
    async fn fail(
        &self,
        session: &mut EditorSession,
        paths: &[DocumentPath],
        error: GitOperationError,
    ) -> SyncOutcome {
        let message = error.message();
        let structural = self.detect_structural_conflict().await;
        let conflict = structural || error_indicates_conflict(&message);
        warn!(error = %error, structural, conflict, "sync cycle failed");

        if !conflict {
            for path in paths {
                apply(session, path, SyncEvent::CycleFailed);
            }
            return SyncOutcome::error(message);
        }

        for path in paths {
            match self.read_with_mtime(path).await {
                Ok((content, modified)) => {
                    if let Err(error) = session.reload(path, content, modified) {
                        warn!(path = %path, error = %error, "failed to reload conflicted document");
                    }
                }
                Err(error) => {
                    warn!(path = %path, error = %format!("{error:#}"), "failed to reload conflicted document")
                }
            }
            apply(session, path, SyncEvent::CycleConflict);
        }
        SyncOutcome { error: Some(message), ..SyncOutcome::conflict(paths.to_vec()) }
    }

    /// Unmerged entries or a stopped rebase, read from git itself.
    async fn detect_structural_conflict(&self) -> bool {
        let check = self
            .git
            .run(|git| {
                let rebasing = git.is_rebase_in_progress();
                let unmerged = git.status()?.has_unmerged();
                Ok(rebasing || unmerged)
            })
            .await;
        match check {
            Ok(found) => found,
            Err(error) => {
                debug!(error = %error, "structural conflict check failed");
                false
            }
        }
    }

    async fn read_with_mtime(&self, path: &DocumentPath) -> Result<(String, Option<DateTime<Utc>>)> {
        let content = self.fs.read_to_string(path).await?;
        let modified = self.fs.modified(path).await.ok().map(DateTime::<Utc>::from);
        Ok((content, modified))
    }
}

/// Refuse the cycle before anything is committed; open documents among
/// `paths` move to `conflict`.
fn refuse(session: &mut EditorSession, paths: Vec<DocumentPath>, reason: &str) -> SyncOutcome {
    for path in &paths {
        if session.is_open(path) {
            apply(session, path, SyncEvent::ConflictDetected);
        }
    }
    SyncOutcome::refused(paths, reason)
}

fn document_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<DocumentPath> {
    paths.into_iter().filter_map(|path| DocumentPath::new(path).ok()).collect()
}

/// Markdown files git would stage, excluding deletions.
fn changed_markdown(status: &GitStatus) -> Vec<DocumentPath> {
    let kept = status.entries.iter().filter(|entry| entry.index != 'D' && entry.worktree != 'D');
    document_paths(kept.map(|entry| entry.path.as_str())).into_iter().filter(DocumentPath::is_markdown).collect()
}

fn apply(session: &mut EditorSession, path: &DocumentPath, event: SyncEvent) {
    if let Err(error) = session.transition(path, event) {
        warn!(path = %path, error = %error, "unexpected sync transition");
    }
}
