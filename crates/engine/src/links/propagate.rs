// Link rewriting after a file or folder move.
//
// Two passes, run concurrently:
// 1. links inside the moved content, re-expressed from the new location;
// 2. links elsewhere that pointed into the moved path.
// Each file's read-modify-write happens under its path lock.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quire_common::links::{apply_edits, scan, TextEdit};
use quire_common::path::{relative_from, resolve_relative, DocumentPath};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::{for_each_document, BatchReport, FileFailure};
use crate::session::SharedSession;
use crate::watcher::MutedWriter;
use crate::workspace::{PathLocks, WorkspaceFs};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub old_path: DocumentPath,
    pub new_path: DocumentPath,
    pub is_folder: bool,
}

impl MoveOperation {
    /// Where `target` lives after the move, if the move affects it.
    fn relocate(&self, target: &DocumentPath) -> Option<DocumentPath> {
        if self.is_folder {
            target.rebase(&self.old_path, &self.new_path)
        } else if *target == self.old_path {
            Some(self.new_path.clone())
        } else {
            None
        }
    }

    fn moved_file_contains(&self, path: &DocumentPath) -> bool {
        if self.is_folder {
            path.is_within(&self.new_path)
        } else {
            *path == self.new_path
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub files_updated: usize,
    pub links_updated: usize,
    pub failures: Vec<FileFailure>,
}

/// Edits that keep every link in `content` pointing at the same logical
/// target after the document moved from `old_source` to `new_source` and
/// `op` was applied to the tree. Pass the same path twice for a document
/// that did not move.
///
/// Links that fail to resolve, and links whose text is still correct, are
/// left alone.
pub fn plan_edits(
    content: &str,
    old_source: &DocumentPath,
    new_source: &DocumentPath,
    op: &MoveOperation,
) -> Vec<TextEdit> {
    let source_moved = old_source != new_source;
    let mut edits = Vec::new();

    for link in scan(content) {
        let text = link.path_text();
        let Ok(resolved) = resolve_relative(old_source, &text) else {
            continue;
        };

        let mut strip_extension = false;
        let relocated = op.relocate(&resolved).or_else(|| {
            if !link.may_omit_markdown_extension() {
                return None;
            }
            let target = op.relocate(&resolved.with_markdown_extension())?;
            strip_extension = true;
            Some(target)
        });

        let target = match relocated {
            Some(target) => target,
            None if source_moved => resolved,
            None => continue,
        };

        if still_resolves(&text, new_source, &target, strip_extension) {
            continue;
        }

        let mut path_text = if text.starts_with('/') {
            format!("/{target}")
        } else {
            relative_from(new_source, &target)
        };
        if strip_extension {
            if let Some(stem) = path_text.strip_suffix(".md") {
                path_text = stem.to_string();
            }
        }

        let replacement = link.encode_like_original(&path_text);
        if replacement != link.raw_text {
            edits.push(TextEdit { span: link.target_span.clone(), replacement });
        }
    }
    edits
}

fn still_resolves(text: &str, source: &DocumentPath, target: &DocumentPath, strip_extension: bool) -> bool {
    match resolve_relative(source, text) {
        Ok(resolved) if strip_extension => resolved.with_markdown_extension() == *target,
        Ok(resolved) => resolved == *target,
        Err(_) => false,
    }
}

pub struct LinkPropagator {
    fs: Arc<dyn WorkspaceFs>,
    writer: MutedWriter,
    session: SharedSession,
    locks: Arc<PathLocks>,
    batch_size: usize,
}

impl LinkPropagator {
    pub fn new(
        fs: Arc<dyn WorkspaceFs>,
        writer: MutedWriter,
        session: SharedSession,
        locks: Arc<PathLocks>,
        batch_size: usize,
    ) -> Self {
        Self { fs, writer, session, locks, batch_size }
    }

    /// Rewrite links after `op` has already been applied on disk.
    ///
    /// Per-file failures are reported in [`MoveReport::failures`]; only a
    /// failure to enumerate the workspace aborts the whole operation.
    pub async fn propagate_move(&self, op: &MoveOperation) -> Result<MoveReport> {
        let markdown = self.fs.list_markdown_files().await?;
        let (moved, others): (Vec<DocumentPath>, Vec<DocumentPath>) =
            markdown.into_iter().partition(|path| op.moved_file_contains(path));

        let inside = for_each_document(moved, self.batch_size, |path| async move {
            let Some(old_source) = path.rebase(&op.new_path, &op.old_path) else {
                return Ok(None);
            };
            self.rewrite_file(path, old_source, op).await
        });
        let elsewhere = for_each_document(others, self.batch_size, |path| async move {
            self.rewrite_file(path.clone(), path, op).await
        });
        let (inside, elsewhere): (BatchReport<usize>, BatchReport<usize>) = tokio::join!(inside, elsewhere);

        let mut report = MoveReport::default();
        for pass in [inside, elsewhere] {
            report.files_updated += pass.items.len();
            report.links_updated += pass.items.iter().sum::<usize>();
            report.failures.extend(pass.failures);
        }

        info!(
            old = %op.old_path,
            new = %op.new_path,
            folder = op.is_folder,
            files = report.files_updated,
            links = report.links_updated,
            failures = report.failures.len(),
            "link propagation finished"
        );
        Ok(report)
    }

    /// Returns the number of links rewritten, or `None` when nothing changed.
    async fn rewrite_file(
        &self,
        path: DocumentPath,
        old_source: DocumentPath,
        op: &MoveOperation,
    ) -> Result<Option<usize>> {
        let _guard = self.locks.lock(&path).await;

        let content = self.fs.read_to_string(&path).await?;
        let edits = plan_edits(&content, &old_source, &path, op);
        if edits.is_empty() {
            return Ok(None);
        }

        let rewritten = apply_edits(&content, &edits);
        self.writer.write(&path, &rewritten).await?;
        debug!(path = %path, links = edits.len(), "links rewritten");

        let mut session = self.session.lock().await;
        let Some(open) = session.get(&path) else {
            return Ok(Some(edits.len()));
        };

        if open.has_unsaved_changes {
            // Keep the user's buffer; apply the same rewrite to it.
            let buffer_edits = plan_edits(&open.content, &old_source, &path, op);
            if !buffer_edits.is_empty() {
                let buffer = apply_edits(&open.content, &buffer_edits);
                session.edit(&path, buffer)?;
            }
        } else {
            let modified = match self.fs.modified(&path).await {
                Ok(modified) => Some(DateTime::<Utc>::from(modified)),
                Err(error) => {
                    warn!(path = %path, error = %format!("{error:#}"), "no mtime after rewrite");
                    None
                }
            };
            session.reload(&path, rewritten, modified)?;
            session.note_local_change(&path)?;
        }
        Ok(Some(edits.len()))
    }
}
