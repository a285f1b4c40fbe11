// Watcher pipeline: raw FS event → document path → debounce → self-write filter.
//
// Whatever survives is an external change the engine should react to
// (reload an open tab, mark it out-of-date, or close it on removal).

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use quire_common::path::DocumentPath;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::workspace::Workspace;

use super::debounce::Debouncer;
use super::mute::WriteMutes;
use super::{FsEventKind, RawFsEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A change to a markdown document that this process did not make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalChange {
    pub path: DocumentPath,
    pub kind: FsEventKind,
}

/// Runs until `raw_rx` closes, `change_tx` is dropped, or `shutdown` flips.
pub async fn run_pipeline(
    mut raw_rx: mpsc::Receiver<RawFsEvent>,
    change_tx: mpsc::Sender<ExternalChange>,
    workspace: Workspace,
    mutes: Arc<WriteMutes>,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut debouncer = Debouncer::new(debounce);
    info!(root = %workspace.root().display(), "watcher pipeline started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                info!("watcher pipeline shutting down");
                break;
            }

            maybe_event = raw_rx.recv() => {
                let Some(event) = maybe_event else {
                    info!("raw event channel closed, pipeline exiting");
                    break;
                };
                match workspace.to_document_path(&event.path) {
                    Some(path) => {
                        trace!(path = %path, kind = ?event.kind, "raw event received");
                        debouncer.push(path, event.kind);
                    }
                    None => debug!(path = %event.path.display(), "event path not in workspace"),
                }
            }

            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        for (path, kind) in debouncer.drain_ready() {
            let Some(change) = classify(&workspace, &mutes, path, kind).await else {
                continue;
            };
            if change_tx.send(change).await.is_err() {
                debug!("external change channel closed, exiting");
                return;
            }
        }
    }
}

/// Drop self-writes; re-label events whose file has already vanished.
async fn classify(
    workspace: &Workspace,
    mutes: &WriteMutes,
    path: DocumentPath,
    kind: FsEventKind,
) -> Option<ExternalChange> {
    if kind == FsEventKind::Remove {
        if mutes.is_muted(&path) {
            trace!(path = %path, "ignoring muted removal");
            return None;
        }
        mutes.forget(&path);
        return Some(ExternalChange { path, kind });
    }

    match tokio::fs::read(workspace.absolute(&path)).await {
        Ok(bytes) => {
            if mutes.should_ignore(&path, Some(&bytes)) {
                trace!(path = %path, "ignoring self-write");
                return None;
            }
            Some(ExternalChange { path, kind })
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {
            mutes.forget(&path);
            Some(ExternalChange { path, kind: FsEventKind::Remove })
        }
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read changed file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::mute::MutedWriter;
    use crate::workspace::LocalFs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    struct Harness {
        _tmp: TempDir,
        workspace: Workspace,
        mutes: Arc<WriteMutes>,
        raw_tx: mpsc::Sender<RawFsEvent>,
        change_rx: mpsc::Receiver<ExternalChange>,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn start() -> Harness {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::open(tmp.path()).unwrap();
        let mutes = Arc::new(WriteMutes::default());
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (change_tx, change_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_pipeline(
            raw_rx,
            change_tx,
            workspace.clone(),
            Arc::clone(&mutes),
            Duration::from_millis(20),
            shutdown_rx,
        ));
        Harness { _tmp: tmp, workspace, mutes, raw_tx, change_rx, _shutdown_tx: shutdown_tx }
    }

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    #[tokio::test]
    async fn external_edit_is_forwarded() {
        let mut h = start();
        let path = doc("notes/a.md");
        let absolute = h.workspace.absolute(&path);
        std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
        std::fs::write(&absolute, "edited elsewhere").unwrap();

        h.raw_tx.send(RawFsEvent { kind: FsEventKind::Modify, path: absolute }).await.unwrap();

        let change = timeout(Duration::from_secs(2), h.change_rx.recv()).await.unwrap().unwrap();
        assert_eq!(change, ExternalChange { path, kind: FsEventKind::Modify });
    }

    #[tokio::test]
    async fn self_write_is_suppressed_after_mute_clears() {
        let mut h = start();
        let writer = MutedWriter::new(
            Arc::new(LocalFs::new(h.workspace.clone())),
            Arc::clone(&h.mutes),
        );
        let ours = doc("ours.md");
        let theirs = doc("theirs.md");
        writer.write(&ours, "rewritten links").await.unwrap();
        assert!(!h.mutes.is_muted(&ours));
        std::fs::write(h.workspace.absolute(&theirs), "external").unwrap();

        for path in [&ours, &theirs] {
            let event = RawFsEvent { kind: FsEventKind::Modify, path: h.workspace.absolute(path) };
            h.raw_tx.send(event).await.unwrap();
        }

        let change = timeout(Duration::from_secs(2), h.change_rx.recv()).await.unwrap().unwrap();
        assert_eq!(change.path, theirs);
        assert!(timeout(Duration::from_millis(150), h.change_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn vanished_file_is_reported_as_removed() {
        let mut h = start();
        let path = doc("gone.md");
        let event = RawFsEvent { kind: FsEventKind::Create, path: h.workspace.absolute(&path) };
        h.raw_tx.send(event).await.unwrap();

        let change = timeout(Duration::from_secs(2), h.change_rx.recv()).await.unwrap().unwrap();
        assert_eq!(change, ExternalChange { path, kind: FsEventKind::Remove });
    }
}
