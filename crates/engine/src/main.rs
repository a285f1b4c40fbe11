// quired: watch a workspace, keep open documents fresh, run auto-sync.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let root = match std::env::args_os().nth(1) {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    info!(root = %root.display(), "starting quire workspace watcher");
    quire_engine::runtime::run_watch(&root).await.context("workspace watcher terminated unexpectedly")
}
