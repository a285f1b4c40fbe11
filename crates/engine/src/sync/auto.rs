// Periodic auto-sync timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SyncError, SyncOrchestrator, SyncTrigger};
use crate::git::CommandExecutor;

/// Owns the timer task. Dropping the handle stops the timer; a cycle already
/// in flight runs to completion.
pub struct AutoSyncHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl AutoSyncHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_auto_sync<E>(orchestrator: Arc<SyncOrchestrator<E>>, interval: Duration) -> AutoSyncHandle
where
    E: CommandExecutor + 'static,
{
    if interval.is_zero() {
        warn!("auto-sync interval is zero; cycles will run back to back");
    }
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "auto-sync started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }

            let message = format!("Auto-sync at {}", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
            match orchestrator.sync_workspace(&message, SyncTrigger::Timer).await {
                Ok(outcome) => debug!(status = %outcome.status, "auto-sync cycle finished"),
                Err(SyncError::AlreadyRunning) => debug!("auto-sync skipped: cycle already running"),
            }
        }
        info!("auto-sync stopped");
    });

    AutoSyncHandle { shutdown_tx, task: Some(task) }
}
