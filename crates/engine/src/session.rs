// Open documents (tabs) and their sync status.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quire_common::path::DocumentPath;
use quire_common::sync::SyncStatus;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::events::{EventHandler, WorkspaceEvent};
use crate::sync::{next_status, InvalidTransition, SyncEvent};
use crate::workspace::BoxFuture;

pub type SharedSession = Arc<Mutex<EditorSession>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("document is not open: {0}")]
    NotOpen(DocumentPath),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenDocument {
    pub path: DocumentPath,
    pub content: String,
    pub has_unsaved_changes: bool,
    sync_status: SyncStatus,
    pub last_modified: Option<DateTime<Utc>>,
    /// Content as of the last successful sync (or open).
    #[serde(skip)]
    synced_snapshot: String,
}

impl OpenDocument {
    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }
}

#[derive(Debug, Default)]
pub struct EditorSession {
    documents: BTreeMap<DocumentPath, OpenDocument>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Open a tab. An already-open document is returned untouched.
    pub fn open(
        &mut self,
        path: DocumentPath,
        content: String,
        status: SyncStatus,
        last_modified: Option<DateTime<Utc>>,
    ) -> &OpenDocument {
        self.documents.entry(path.clone()).or_insert_with(|| OpenDocument {
            path,
            synced_snapshot: content.clone(),
            content,
            has_unsaved_changes: false,
            sync_status: status,
            last_modified,
        })
    }

    pub fn close(&mut self, path: &DocumentPath) -> Option<OpenDocument> {
        self.documents.remove(path)
    }

    pub fn get(&self, path: &DocumentPath) -> Option<&OpenDocument> {
        self.documents.get(path)
    }

    pub fn is_open(&self, path: &DocumentPath) -> bool {
        self.documents.contains_key(path)
    }

    pub fn documents(&self) -> impl Iterator<Item = &OpenDocument> {
        self.documents.values()
    }

    pub fn paths(&self) -> Vec<DocumentPath> {
        self.documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Replace the buffer with user-edited content.
    pub fn edit(&mut self, path: &DocumentPath, content: String) -> Result<SyncStatus, SessionError> {
        let doc = self.doc_mut(path)?;
        doc.content = content;
        doc.has_unsaved_changes = true;
        Ok(self.note_local_change(path)?)
    }

    /// Move `synced → out-of-date` when the buffer differs from the last
    /// synced snapshot. Terminal states are left alone.
    pub fn note_local_change(&mut self, path: &DocumentPath) -> Result<SyncStatus, SessionError> {
        let doc = self.doc_mut(path)?;
        if doc.content != doc.synced_snapshot {
            match next_status(doc.sync_status, SyncEvent::LocalEdit) {
                Ok(next) => doc.sync_status = next,
                Err(error) => debug!(path = %path, error = %error, "local edit left status unchanged"),
            }
        }
        Ok(doc.sync_status)
    }

    pub fn mark_saved(
        &mut self,
        path: &DocumentPath,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        let doc = self.doc_mut(path)?;
        doc.has_unsaved_changes = false;
        if last_modified.is_some() {
            doc.last_modified = last_modified;
        }
        Ok(())
    }

    /// Apply a tracker event to the document's status.
    pub fn transition(&mut self, path: &DocumentPath, event: SyncEvent) -> Result<SyncStatus, SessionError> {
        let doc = self.doc_mut(path)?;
        let next = next_status(doc.sync_status, event)?;
        debug!(path = %path, from = %doc.sync_status, to = %next, "sync status transition");
        doc.sync_status = next;
        Ok(next)
    }

    /// Replace the buffer with on-disk content. Status is untouched.
    pub fn reload(
        &mut self,
        path: &DocumentPath,
        content: String,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        let doc = self.doc_mut(path)?;
        doc.content = content;
        doc.has_unsaved_changes = false;
        doc.last_modified = last_modified;
        Ok(())
    }

    /// Record the current buffer as the synced baseline.
    pub fn mark_snapshot(&mut self, path: &DocumentPath) -> Result<(), SessionError> {
        let doc = self.doc_mut(path)?;
        doc.synced_snapshot = doc.content.clone();
        Ok(())
    }

    /// Re-key tabs after a move. Returns the number of tabs renamed.
    pub fn rename_path(&mut self, old: &DocumentPath, new: &DocumentPath, is_folder: bool) -> usize {
        let moved: Vec<DocumentPath> = self
            .documents
            .keys()
            .filter(|path| if is_folder { path.is_within(old) } else { *path == old })
            .cloned()
            .collect();

        for path in &moved {
            let Some(mut doc) = self.documents.remove(path) else { continue };
            let Some(target) = path.rebase(old, new) else { continue };
            doc.path = target.clone();
            if self.documents.insert(target.clone(), doc).is_some() {
                warn!(path = %target, "renamed tab replaced an open document");
            }
        }
        moved.len()
    }

    /// Close tabs for a deleted file or folder. Returns the closed paths.
    pub fn remove_path(&mut self, path: &DocumentPath, is_folder: bool) -> Vec<DocumentPath> {
        let removed: Vec<DocumentPath> = self
            .documents
            .keys()
            .filter(|open| if is_folder { open.is_within(path) } else { *open == path })
            .cloned()
            .collect();
        for open in &removed {
            self.documents.remove(open);
        }
        removed
    }

    pub fn dirty_paths(&self) -> Vec<DocumentPath> {
        self.documents.values().filter(|doc| doc.has_unsaved_changes).map(|doc| doc.path.clone()).collect()
    }

    pub fn paths_with_status(&self, status: SyncStatus) -> Vec<DocumentPath> {
        self.documents.values().filter(|doc| doc.sync_status == status).map(|doc| doc.path.clone()).collect()
    }

    fn doc_mut(&mut self, path: &DocumentPath) -> Result<&mut OpenDocument, SessionError> {
        self.documents.get_mut(path).ok_or_else(|| SessionError::NotOpen(path.clone()))
    }
}

/// Keeps open tabs pointed at the right paths across renames and deletes.
pub struct TabTracker {
    session: SharedSession,
}

impl TabTracker {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }
}

impl EventHandler for TabTracker {
    fn name(&self) -> &'static str {
        "tab-tracker"
    }

    fn handle<'a>(&'a self, event: &'a WorkspaceEvent) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut session = self.session.lock().await;
            match event {
                WorkspaceEvent::PathRenamed { old, new, is_folder } => {
                    let renamed = session.rename_path(old, new, *is_folder);
                    debug!(old = %old, new = %new, renamed, "tabs re-keyed");
                }
                WorkspaceEvent::PathDeleted { path, is_folder } => {
                    let closed = session.remove_path(path, *is_folder);
                    debug!(path = %path, closed = closed.len(), "tabs closed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    fn session_with(paths: &[&str]) -> EditorSession {
        let mut session = EditorSession::new();
        for path in paths {
            session.open(doc(path), format!("# {path}"), SyncStatus::Synced, None);
        }
        session
    }

    #[test]
    fn edit_marks_dirty_and_out_of_date() {
        let mut session = session_with(&["a.md"]);

        let status = session.edit(&doc("a.md"), "# changed".to_string()).unwrap();

        assert_eq!(status, SyncStatus::OutOfDate);
        assert_eq!(session.dirty_paths(), vec![doc("a.md")]);
    }

    #[test]
    fn edit_back_to_snapshot_keeps_synced() {
        let mut session = session_with(&["a.md"]);
        let status = session.edit(&doc("a.md"), "# a.md".to_string()).unwrap();
        assert_eq!(status, SyncStatus::Synced);
        assert!(session.get(&doc("a.md")).unwrap().has_unsaved_changes);
    }

    #[test]
    fn edit_in_conflict_stays_conflict() {
        let mut session = EditorSession::new();
        session.open(doc("a.md"), "x".to_string(), SyncStatus::Conflict, None);
        assert_eq!(session.edit(&doc("a.md"), "y".to_string()).unwrap(), SyncStatus::Conflict);
    }

    #[test]
    fn open_twice_keeps_existing_buffer() {
        let mut session = session_with(&["a.md"]);
        session.edit(&doc("a.md"), "unsaved".to_string()).unwrap();
        let reopened = session.open(doc("a.md"), "disk".to_string(), SyncStatus::Synced, None);
        assert_eq!(reopened.content, "unsaved");
    }

    #[test]
    fn invalid_transition_is_reported() {
        let mut session = session_with(&["a.md"]);
        let error = session.transition(&doc("a.md"), SyncEvent::CycleSucceeded).unwrap_err();
        assert!(matches!(error, SessionError::Transition(_)));
        assert!(matches!(
            session.transition(&doc("missing.md"), SyncEvent::LocalEdit),
            Err(SessionError::NotOpen(_))
        ));
    }

    #[test]
    fn reload_clears_dirty_without_touching_status() {
        let mut session = session_with(&["a.md"]);
        session.edit(&doc("a.md"), "local".to_string()).unwrap();

        session.reload(&doc("a.md"), "disk".to_string(), Some(Utc::now())).unwrap();

        let open = session.get(&doc("a.md")).unwrap();
        assert_eq!(open.content, "disk");
        assert!(!open.has_unsaved_changes);
        assert_eq!(open.sync_status(), SyncStatus::OutOfDate);
    }

    #[test]
    fn folder_rename_rekeys_descendants_only() {
        let mut session = session_with(&["docs/a.md", "docs/sub/b.md", "docsx/c.md", "d.md"]);

        let renamed = session.rename_path(&doc("docs"), &doc("archive/docs"), true);

        assert_eq!(renamed, 2);
        assert_eq!(
            session.paths(),
            vec![doc("archive/docs/a.md"), doc("archive/docs/sub/b.md"), doc("d.md"), doc("docsx/c.md")]
        );
        assert_eq!(session.get(&doc("archive/docs/a.md")).unwrap().path, doc("archive/docs/a.md"));
    }

    #[test]
    fn remove_folder_closes_tabs_beneath() {
        let mut session = session_with(&["docs/a.md", "docs/b.md", "c.md"]);
        let closed = session.remove_path(&doc("docs"), true);
        assert_eq!(closed.len(), 2);
        assert_eq!(session.paths(), vec![doc("c.md")]);
    }

    #[tokio::test]
    async fn tab_tracker_follows_events() {
        let session = EditorSession::shared();
        session.lock().await.open(doc("a.md"), String::new(), SyncStatus::Synced, None);
        let tracker = TabTracker::new(Arc::clone(&session));

        tracker
            .handle(&WorkspaceEvent::PathRenamed { old: doc("a.md"), new: doc("notes/a.md"), is_folder: false })
            .await;
        assert!(session.lock().await.is_open(&doc("notes/a.md")));

        tracker.handle(&WorkspaceEvent::PathDeleted { path: doc("notes/a.md"), is_folder: false }).await;
        assert!(session.lock().await.is_empty());
    }
}
