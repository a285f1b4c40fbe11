// Git facade: porcelain parsing, the process-backed worker, and a
// serializing async handle over it.

pub mod log;
pub mod status;
pub mod worker;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use log::CommitInfo;
pub use status::{GitStatus, StatusEntry};
pub use worker::{
    CommandExecutor, CommandResult, GitOperationError, GitWorker, ProcessCommandExecutor,
    RestoreOutcome,
};

/// Async access to a [`GitWorker`]. At most one git operation runs against the
/// working tree at a time; callers queue behind the lock.
pub struct GitHandle<E = ProcessCommandExecutor> {
    worker: Arc<GitWorker<E>>,
    lock: Arc<Mutex<()>>,
}

impl<E> Clone for GitHandle<E> {
    fn clone(&self) -> Self {
        Self { worker: Arc::clone(&self.worker), lock: Arc::clone(&self.lock) }
    }
}

impl<E: CommandExecutor + 'static> GitHandle<E> {
    pub fn new(worker: GitWorker<E>) -> Self {
        Self { worker: Arc::new(worker), lock: Arc::new(Mutex::new(())) }
    }

    pub fn worker(&self) -> &GitWorker<E> {
        &self.worker
    }

    /// Run `op` on the blocking pool while holding the workspace git lock.
    /// Several git calls inside one `op` run as a unit.
    pub async fn run<T, F>(&self, op: F) -> Result<T, GitOperationError>
    where
        T: Send + 'static,
        F: FnOnce(&GitWorker<E>) -> Result<T, GitOperationError> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let worker = Arc::clone(&self.worker);
        tokio::task::spawn_blocking(move || op(&worker)).await.map_err(|error| {
            GitOperationError::SpawnFailed {
                command: "git (blocking task)".to_string(),
                message: error.to_string(),
            }
        })?
    }
}
