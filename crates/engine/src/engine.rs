// WorkspaceEngine: the surface the editor layer and CLI call into.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quire_common::path::DocumentPath;
use quire_common::sync::SyncStatus;
use tracing::{debug, info, warn};

use crate::batch::BatchReport;
use crate::config::{GlobalConfig, WorkspaceConfig};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, WorkspaceEvent};
use crate::git::{
    CommandExecutor, CommitInfo, GitHandle, GitOperationError, GitWorker, ProcessCommandExecutor,
    RestoreOutcome,
};
use crate::links::{
    ImageLinkReport, LinkPropagator, LinkValidator, MoveOperation, MoveReport, PageLinkReport,
    UnusedImage,
};
use crate::session::{EditorSession, OpenDocument, SharedSession, TabTracker};
use crate::sync::{
    initial_status, start_auto_sync, AutoSyncHandle, SyncEvent, SyncOrchestrator, SyncOutcome,
    SyncSettings, SyncTrigger,
};
use crate::watcher::{ExternalChange, FsEventKind, MutedWriter, WriteMutes};
use crate::workspace::{LocalFs, PathLocks, Workspace, WorkspaceFs};

pub struct WorkspaceEngine<E = ProcessCommandExecutor> {
    workspace: Workspace,
    config: WorkspaceConfig,
    fs: Arc<dyn WorkspaceFs>,
    writer: MutedWriter,
    locks: Arc<PathLocks>,
    session: SharedSession,
    events: Arc<EventBus>,
    git: GitHandle<E>,
    propagator: LinkPropagator,
    validator: LinkValidator,
    orchestrator: Arc<SyncOrchestrator<E>>,
}

impl WorkspaceEngine<ProcessCommandExecutor> {
    /// Open the workspace at `root` with its `.quire/workspace.toml` settings.
    pub fn open(root: &Path) -> EngineResult<Self> {
        let workspace = Workspace::open(root)?;
        let config = WorkspaceConfig::load(workspace.root());
        let fs: Arc<dyn WorkspaceFs> = Arc::new(LocalFs::new(workspace.clone()));
        let git = GitWorker::new(workspace.root());
        Ok(Self::with_parts(workspace, config, fs, git))
    }
}

impl<E: CommandExecutor + 'static> WorkspaceEngine<E> {
    pub fn with_parts(
        workspace: Workspace,
        config: WorkspaceConfig,
        fs: Arc<dyn WorkspaceFs>,
        git: GitWorker<E>,
    ) -> Self {
        let mutes = Arc::new(WriteMutes::new(Duration::from_millis(config.watcher.mute_window_ms)));
        let writer = MutedWriter::new(Arc::clone(&fs), mutes);
        let locks = Arc::new(PathLocks::new());
        let session = EditorSession::shared();
        let events = Arc::new(EventBus::new());
        events.subscribe(Arc::new(TabTracker::new(Arc::clone(&session))));

        let git = GitHandle::new(git);
        let batch_size = config.links.batch_size;
        let propagator = LinkPropagator::new(
            Arc::clone(&fs),
            writer.clone(),
            Arc::clone(&session),
            Arc::clone(&locks),
            batch_size,
        );
        let validator = LinkValidator::new(Arc::clone(&fs), batch_size);
        let settings = SyncSettings {
            remote: config.git.remote.clone(),
            branch: config.git.branch.clone(),
            auto_save: config.sync.auto_save,
        };
        let orchestrator = Arc::new(SyncOrchestrator::new(
            git.clone(),
            Arc::clone(&session),
            Arc::clone(&fs),
            writer.clone(),
            Arc::clone(&locks),
            settings,
        ));

        Self {
            workspace,
            config,
            fs,
            writer,
            locks,
            session,
            events,
            git,
            propagator,
            validator,
            orchestrator,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Register additional handlers (file tree cache, favorites) here.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn mutes(&self) -> &Arc<WriteMutes> {
        self.writer.mutes()
    }

    pub fn git(&self) -> &GitHandle<E> {
        &self.git
    }

    /// Parse user input (workspace-relative or absolute) into a document path.
    pub fn document_path(&self, input: &str) -> EngineResult<DocumentPath> {
        let candidate = Path::new(input);
        if candidate.is_absolute() {
            return self
                .workspace
                .to_document_path(candidate)
                .ok_or_else(|| EngineError::OutsideWorkspace(input.to_string()));
        }
        Ok(DocumentPath::new(input)?)
    }

    // ── Documents ───────────────────────────────────────────────────

    pub async fn open_document(&self, path: &DocumentPath) -> EngineResult<OpenDocument> {
        if let Some(open) = self.session.lock().await.get(path) {
            return Ok(open.clone());
        }

        let content = self.fs.read_to_string(path).await?;
        let modified = self.modified(path).await;
        let status = self.status_from_git(path, &content).await;

        let mut session = self.session.lock().await;
        let open = session.open(path.clone(), content, status, modified).clone();
        debug!(path = %path, status = %open.sync_status(), "document opened");
        Ok(open)
    }

    pub async fn edit_document(&self, path: &DocumentPath, content: String) -> EngineResult<SyncStatus> {
        Ok(self.session.lock().await.edit(path, content)?)
    }

    pub async fn save_document(&self, path: &DocumentPath) -> EngineResult<()> {
        let _guard = self.locks.lock(path).await;
        let mut session = self.session.lock().await;
        let content = session
            .get(path)
            .map(|doc| doc.content.clone())
            .ok_or_else(|| EngineError::NotFound(path.clone()))?;
        self.writer.write(path, &content).await?;
        let modified = self.modified(path).await;
        session.mark_saved(path, modified)?;
        Ok(())
    }

    pub async fn close_document(&self, path: &DocumentPath) -> Option<OpenDocument> {
        self.session.lock().await.close(path)
    }

    // ── Moves and deletes ───────────────────────────────────────────

    /// Rewrite links for a move that has already happened on disk.
    pub async fn propagate_move(
        &self,
        old_path: &DocumentPath,
        new_path: &DocumentPath,
        is_folder: bool,
    ) -> EngineResult<MoveReport> {
        let op = MoveOperation { old_path: old_path.clone(), new_path: new_path.clone(), is_folder };
        Ok(self.propagator.propagate_move(&op).await?)
    }

    /// Move a file or folder on disk, re-key open tabs, then rewrite links.
    pub async fn move_path(
        &self,
        old_path: &DocumentPath,
        new_path: &DocumentPath,
        is_folder: bool,
    ) -> EngineResult<MoveReport> {
        if !self.fs.exists(old_path).await {
            return Err(EngineError::NotFound(old_path.clone()));
        }
        if self.fs.exists(new_path).await {
            return Err(EngineError::AlreadyExists(new_path.clone()));
        }

        let mutes = self.writer.mutes();
        mutes.mute(old_path);
        mutes.mute(new_path);
        self.fs.rename(old_path, new_path).await?;
        self.remember_relocated(new_path, is_folder).await;

        info!(old = %old_path, new = %new_path, folder = is_folder, "path moved");
        self.events
            .publish(WorkspaceEvent::PathRenamed {
                old: old_path.clone(),
                new: new_path.clone(),
                is_folder,
            })
            .await;

        self.propagate_move(old_path, new_path, is_folder).await
    }

    pub async fn delete_path(&self, path: &DocumentPath, is_folder: bool) -> EngineResult<()> {
        if !self.fs.exists(path).await {
            return Err(EngineError::NotFound(path.clone()));
        }
        self.writer.mutes().mute(path);
        self.fs.remove(path).await?;
        info!(path = %path, folder = is_folder, "path deleted");
        self.events.publish(WorkspaceEvent::PathDeleted { path: path.clone(), is_folder }).await;
        Ok(())
    }

    /// Record the relocated markdown content so the watcher treats the
    /// create events at the new location as our own.
    async fn remember_relocated(&self, new_path: &DocumentPath, is_folder: bool) {
        let files = if is_folder {
            match self.fs.list_files(Some(new_path)).await {
                Ok(files) => files.into_iter().filter(DocumentPath::is_markdown).collect(),
                Err(error) => {
                    debug!(path = %new_path, error = %format!("{error:#}"), "could not list moved folder");
                    Vec::new()
                }
            }
        } else if new_path.is_markdown() {
            vec![new_path.clone()]
        } else {
            Vec::new()
        };

        for file in files {
            if let Ok(content) = self.fs.read_to_string(&file).await {
                self.writer.mutes().record_write(&file, content.as_bytes());
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    pub async fn validate_all_page_links(&self) -> EngineResult<BatchReport<PageLinkReport>> {
        Ok(self.validator.validate_all_page_links().await?)
    }

    pub async fn validate_all_image_links(&self) -> EngineResult<BatchReport<ImageLinkReport>> {
        Ok(self.validator.validate_all_image_links().await?)
    }

    /// Unused images under `assets_dir`, or the configured assets directory.
    pub async fn find_unused_images(
        &self,
        assets_dir: Option<&str>,
    ) -> EngineResult<BatchReport<UnusedImage>> {
        let assets_dir = assets_dir.unwrap_or(&self.config.links.assets_dir);
        Ok(self.validator.find_unused_images(assets_dir).await?)
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Status of an open document, or derived from git for a closed one.
    pub async fn get_sync_status(&self, path: &DocumentPath) -> EngineResult<SyncStatus> {
        if let Some(open) = self.session.lock().await.get(path) {
            return Ok(open.sync_status());
        }
        if !self.fs.exists(path).await {
            return Err(EngineError::NotFound(path.clone()));
        }
        let content = self.fs.read_to_string(path).await?;
        Ok(self.status_from_git(path, &content).await)
    }

    pub async fn sync_workspace(&self, message: &str, trigger: SyncTrigger) -> EngineResult<SyncOutcome> {
        Ok(self.orchestrator.sync_workspace(message, trigger).await?)
    }

    /// Start the periodic timer when `[sync] auto_sync_interval_sec` is set.
    pub fn start_auto_sync(&self) -> Option<AutoSyncHandle> {
        match self.config.sync.auto_sync_interval_sec {
            0 => None,
            secs => Some(start_auto_sync(Arc::clone(&self.orchestrator), Duration::from_secs(secs))),
        }
    }

    /// Abandon a stopped rebase and settle conflicted tabs. Local commits the
    /// rebase was replaying are still unpushed, so those tabs are out of date.
    pub async fn abort_sync(&self) -> EngineResult<()> {
        let (remote, branch) = (self.config.git.remote.clone(), self.config.git.branch.clone());
        let unpushed = self
            .git
            .run(move |git| {
                if git.is_rebase_in_progress() {
                    git.rebase_abort()?;
                }
                Ok(git.has_unpushed_commits(&remote, &branch).unwrap_or_else(|error| {
                    debug!(error = %error, "could not count unpushed commits after abort");
                    false
                }))
            })
            .await?;

        let conflicted = self.session.lock().await.paths_with_status(SyncStatus::Conflict);
        for path in conflicted {
            self.settle(&path, unpushed).await?;
        }
        info!("sync aborted");
        Ok(())
    }

    // ── History ─────────────────────────────────────────────────────

    pub async fn get_history(&self, path: &DocumentPath, limit: usize) -> EngineResult<Vec<CommitInfo>> {
        let path = path.to_string();
        Ok(self.git.run(move |git| git.log_for_file(&path, limit)).await?)
    }

    /// Diff between two commits, or against the working tree when either
    /// end is missing.
    pub async fn get_diff(
        &self,
        path: &DocumentPath,
        from: Option<&str>,
        to: Option<&str>,
    ) -> EngineResult<String> {
        let path = path.to_string();
        let range = from.zip(to).map(|(from, to)| (from.to_string(), to.to_string()));
        let diff = self
            .git
            .run(move |git| match range {
                Some((from, to)) => git.diff_commits(&path, &from, &to),
                None => git.diff_working_tree(&path),
            })
            .await?;
        Ok(diff)
    }

    pub async fn show_at_commit(&self, path: &DocumentPath, hash: &str) -> EngineResult<String> {
        let (path, hash) = (path.to_string(), hash.to_string());
        Ok(self.git.run(move |git| git.show_file_at_commit(&path, &hash)).await?)
    }

    /// Restore a file to `hash` and commit. A failure part-way puts the open
    /// document into `error`.
    pub async fn restore_to_commit(&self, path: &DocumentPath, hash: &str) -> EngineResult<RestoreOutcome> {
        let (file, commit) = (path.to_string(), hash.to_string());
        let result = self.git.run(move |git| git.restore_file_from_commit(&file, &commit)).await;

        match result {
            Ok(outcome) => {
                info!(path = %path, hash, outcome = ?outcome, "file restored");
                self.settle_after_user_action(path).await?;
                Ok(outcome)
            }
            Err(error) => {
                warn!(path = %path, hash, error = %error, "restore failed");
                let mut session = self.session.lock().await;
                if session.is_open(path) {
                    if let Err(error) = session.transition(path, SyncEvent::RestoreFailed) {
                        warn!(path = %path, error = %error, "could not mark restore failure");
                    }
                }
                Err(error.into())
            }
        }
    }

    /// Throw away local changes to `path`. When this resolves the last
    /// unmerged file of a stopped rebase, the rebase is continued.
    pub async fn discard_changes(&self, path: &DocumentPath) -> EngineResult<SyncStatus> {
        let file = path.to_string();
        self.git
            .run(move |git| {
                git.discard_working_changes(&file)?;
                if git.is_rebase_in_progress() && !git.status()?.has_unmerged() {
                    finish_rebase(git)?;
                }
                Ok(())
            })
            .await?;
        info!(path = %path, "local changes discarded");
        self.settle_after_user_action(path).await
    }

    /// Set the commit identity and remote URL, then persist the URL.
    pub async fn configure_remote(
        &mut self,
        url: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> EngineResult<()> {
        let global = GlobalConfig::load();
        let name = name.map(str::to_string).or(global.author.name).ok_or(EngineError::MissingIdentity)?;
        let email = email.map(str::to_string).or(global.author.email).ok_or(EngineError::MissingIdentity)?;

        let remote = self.config.git.remote.clone();
        let target = url.to_string();
        self.git
            .run(move |git| git.configure_identity_and_remote(&name, &email, &remote, &target))
            .await?;

        self.config.git.remote_url = Some(url.to_string());
        self.config.save(self.workspace.root())?;
        info!(remote = %self.config.git.remote, url, "remote configured");
        Ok(())
    }

    // ── Watcher ─────────────────────────────────────────────────────

    /// React to a change another process made to a document.
    pub async fn handle_external_change(&self, change: ExternalChange) -> EngineResult<()> {
        let ExternalChange { path, kind } = change;
        if kind == FsEventKind::Remove {
            if self.session.lock().await.is_open(&path) {
                self.events.publish(WorkspaceEvent::PathDeleted { path, is_folder: false }).await;
            }
            return Ok(());
        }

        let mut session = self.session.lock().await;
        let Some(open) = session.get(&path) else {
            return Ok(());
        };
        if open.has_unsaved_changes {
            info!(path = %path, "external change ignored: document has unsaved edits");
            return Ok(());
        }

        let content = self.fs.read_to_string(&path).await?;
        let modified = self.modified(&path).await;
        session.reload(&path, content, modified)?;
        let status = session.note_local_change(&path)?;
        debug!(path = %path, status = %status, "reloaded after external change");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn modified(&self, path: &DocumentPath) -> Option<DateTime<Utc>> {
        self.fs.modified(path).await.ok().map(DateTime::<Utc>::from)
    }

    async fn status_from_git(&self, path: &DocumentPath, content: &str) -> SyncStatus {
        let file = path.to_string();
        match self.git.run(move |git| git.file_status(&file)).await {
            Ok(entry) => initial_status(entry.as_ref(), content),
            Err(error) => {
                warn!(path = %path, error = %error, "git status failed");
                SyncStatus::Error
            }
        }
    }

    async fn settle_after_user_action(&self, path: &DocumentPath) -> EngineResult<SyncStatus> {
        self.settle(path, false).await
    }

    /// Reload an open document after discard/restore/abort and apply the
    /// user-resolution transition; `unpushed` keeps it out of date even when
    /// the working tree is clean.
    async fn settle(&self, path: &DocumentPath, unpushed: bool) -> EngineResult<SyncStatus> {
        let content = self.fs.read_to_string(path).await?;
        let modified = self.modified(path).await;
        let file = path.to_string();
        let entry = self.git.run(move |git| git.file_status(&file)).await?;

        let mut session = self.session.lock().await;
        if !session.is_open(path) {
            return Ok(initial_status(entry.as_ref(), &content));
        }
        session.reload(path, content, modified)?;
        let dirty = entry.is_some() || unpushed;
        let status = session.transition(path, SyncEvent::UserResolved { dirty })?;
        session.mark_snapshot(path)?;
        Ok(status)
    }
}

fn finish_rebase<E: CommandExecutor>(git: &GitWorker<E>) -> Result<(), GitOperationError> {
    match git.rebase_continue() {
        Ok(()) => Ok(()),
        Err(error) if nothing_left_to_apply(&error.message()) => git.rebase_skip(),
        Err(error) => Err(error),
    }
}

/// The stopped commit became empty once the conflict was resolved.
fn nothing_left_to_apply(message: &str) -> bool {
    ["nothing to commit", "No changes", "now empty"].iter().any(|needle| message.contains(needle))
}
