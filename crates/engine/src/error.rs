// Errors surfaced by `WorkspaceEngine`.

use quire_common::path::{DocumentPath, PathError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::git::GitOperationError;
use crate::session::SessionError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("path is outside the workspace: {0}")]
    OutsideWorkspace(String),
    #[error("no such file or folder: {0}")]
    NotFound(DocumentPath),
    #[error("destination already exists: {0}")]
    AlreadyExists(DocumentPath),
    #[error("author name and email are required (pass them or set [author] in the global config)")]
    MissingIdentity,
    #[error(transparent)]
    Git(#[from] GitOperationError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
