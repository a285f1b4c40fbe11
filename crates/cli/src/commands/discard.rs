// `quire discard`: drop local changes to a document.

use clap::Args;
use quire_common::sync::SyncStatus;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct DiscardArgs {
    /// Document path.
    pub path: String,
}

#[derive(Debug, Serialize)]
struct Discarded {
    path: String,
    status: SyncStatus,
}

pub fn run(args: DiscardArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let status = ctx.block_on(ctx.engine.discard_changes(&path))?;
    let discarded = Discarded { path: path.to_string(), status };
    ctx.print(&discarded, |d| format!("Discarded local changes to {} ({}).", d.path, d.status))?;
    Ok(ExitCode::Success)
}
