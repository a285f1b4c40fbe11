// Long-running watch mode: file watcher → pipeline → engine, plus auto-sync.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::engine::WorkspaceEngine;
use crate::git::CommandExecutor;
use crate::watcher::debounce::DEFAULT_DEBOUNCE;
use crate::watcher::{run_pipeline, ExternalChange, FileWatcher};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Watch the workspace at `root` until Ctrl-C.
pub async fn run_watch(root: &Path) -> Result<()> {
    let engine = WorkspaceEngine::open(root).context("failed to open workspace")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    run_until_shutdown(&engine, shutdown_rx).await
}

/// Drive external changes into `engine` until `shutdown` flips.
pub async fn run_until_shutdown<E: CommandExecutor + 'static>(
    engine: &WorkspaceEngine<E>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let workspace = engine.workspace().clone();
    let (_watcher, raw_rx) = FileWatcher::start(workspace.root())?;
    let (change_tx, mut change_rx) = mpsc::channel::<ExternalChange>(CHANGE_CHANNEL_CAPACITY);

    let pipeline = tokio::spawn(run_pipeline(
        raw_rx,
        change_tx,
        workspace.clone(),
        std::sync::Arc::clone(engine.mutes()),
        DEFAULT_DEBOUNCE,
        shutdown.clone(),
    ));
    let auto_sync = engine.start_auto_sync();

    info!(root = %workspace.root().display(), auto_sync = auto_sync.is_some(), "watching workspace");
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            maybe_change = change_rx.recv() => {
                let Some(change) = maybe_change else { break };
                if let Err(error) = engine.handle_external_change(change.clone()).await {
                    warn!(path = %change.path, error = %error, "failed to apply external change");
                }
            }
        }
    }

    if let Some(handle) = auto_sync {
        handle.wait().await;
    }
    let _ = pipeline.await;
    info!("workspace watcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_common::path::DocumentPath;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn external_edit_reloads_open_document() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("note.md"), "first").unwrap();
        let engine = WorkspaceEngine::open(tmp.path()).unwrap();
        let path = DocumentPath::new("note.md").unwrap();
        engine.open_document(&path).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = run_until_shutdown(&engine, shutdown_rx);
        let edit = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            std::fs::write(tmp.path().join("note.md"), "second").unwrap();

            let mut reloaded = false;
            for _ in 0..40 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if engine.session().lock().await.get(&path).unwrap().content == "second" {
                    reloaded = true;
                    break;
                }
            }
            let _ = shutdown_tx.send(true);
            reloaded
        };

        let (result, reloaded) = tokio::join!(run, edit);
        result.unwrap();
        assert!(reloaded, "open document was not reloaded");
    }
}
