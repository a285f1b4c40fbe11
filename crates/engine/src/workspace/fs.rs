// Content read/write primitive consumed by the propagator, validators and sync.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use anyhow::{Context, Result};
use quire_common::path::DocumentPath;

use super::Workspace;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Filesystem operations on workspace-relative paths.
///
/// Trait-based so tests can count writes or inject per-file failures.
pub trait WorkspaceFs: Send + Sync {
    fn read_to_string<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<String>>;

    /// Write `content`, creating parent directories as needed.
    fn write<'a>(&'a self, path: &'a DocumentPath, content: &'a str) -> BoxFuture<'a, Result<()>>;

    fn exists<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, bool>;

    fn modified<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<SystemTime>>;

    /// Move a file or folder, creating the destination's parent directories.
    fn rename<'a>(&'a self, from: &'a DocumentPath, to: &'a DocumentPath)
        -> BoxFuture<'a, Result<()>>;

    /// Remove a file, or a folder with everything beneath it.
    fn remove<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<()>>;

    /// Every file under `dir` (or the whole workspace), recursively.
    ///
    /// Hidden entries (leading `.`) below the starting directory are skipped,
    /// so `.git` never shows up but `list_files(Some(".images"))` works. A
    /// missing directory yields an empty list.
    fn list_files<'a>(
        &'a self,
        dir: Option<&'a DocumentPath>,
    ) -> BoxFuture<'a, Result<Vec<DocumentPath>>>;

    fn list_markdown_files(&self) -> BoxFuture<'_, Result<Vec<DocumentPath>>> {
        Box::pin(async move {
            let files = self.list_files(None).await?;
            Ok(files.into_iter().filter(DocumentPath::is_markdown).collect())
        })
    }
}

/// `WorkspaceFs` backed by the local disk through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    workspace: Workspace,
}

impl LocalFs {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

impl WorkspaceFs for LocalFs {
    fn read_to_string<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let absolute = self.workspace.absolute(path);
            tokio::fs::read_to_string(&absolute)
                .await
                .with_context(|| format!("failed to read {}", absolute.display()))
        })
    }

    fn write<'a>(&'a self, path: &'a DocumentPath, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let absolute = self.workspace.absolute(path);
            if let Some(parent) = absolute.parent() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create parent directory {}", parent.display())
                })?;
            }
            tokio::fs::write(&absolute, content.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", absolute.display()))
        })
    }

    fn exists<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            tokio::fs::try_exists(self.workspace.absolute(path)).await.unwrap_or(false)
        })
    }

    fn modified<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<SystemTime>> {
        Box::pin(async move {
            let absolute = self.workspace.absolute(path);
            let metadata = tokio::fs::metadata(&absolute)
                .await
                .with_context(|| format!("failed to stat {}", absolute.display()))?;
            metadata
                .modified()
                .with_context(|| format!("mtime unavailable for {}", absolute.display()))
        })
    }

    fn rename<'a>(
        &'a self,
        from: &'a DocumentPath,
        to: &'a DocumentPath,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let source = self.workspace.absolute(from);
            let target = self.workspace.absolute(to);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create parent directory {}", parent.display())
                })?;
            }
            tokio::fs::rename(&source, &target).await.with_context(|| {
                format!("failed to move {} to {}", source.display(), target.display())
            })
        })
    }

    fn remove<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let absolute = self.workspace.absolute(path);
            let metadata = tokio::fs::metadata(&absolute)
                .await
                .with_context(|| format!("failed to stat {}", absolute.display()))?;
            let removed = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&absolute).await
            } else {
                tokio::fs::remove_file(&absolute).await
            };
            removed.with_context(|| format!("failed to remove {}", absolute.display()))
        })
    }

    fn list_files<'a>(
        &'a self,
        dir: Option<&'a DocumentPath>,
    ) -> BoxFuture<'a, Result<Vec<DocumentPath>>> {
        Box::pin(async move {
            let start = match dir {
                Some(dir) => self.workspace.absolute(dir),
                None => self.workspace.root().to_path_buf(),
            };
            if !tokio::fs::try_exists(&start).await.unwrap_or(false) {
                return Ok(Vec::new());
            }

            let mut files = Vec::new();
            let mut pending = vec![start];
            while let Some(current) = pending.pop() {
                let mut entries = tokio::fs::read_dir(&current)
                    .await
                    .with_context(|| format!("failed to list {}", current.display()))?;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }
                    let file_type = entry.file_type().await?;
                    if file_type.is_dir() {
                        pending.push(entry.path());
                    } else if file_type.is_file() {
                        if let Some(path) = self.workspace.to_document_path(&entry.path()) {
                            files.push(path);
                        }
                    }
                }
            }
            files.sort();
            Ok(files)
        })
    }
}
