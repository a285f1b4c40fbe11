// `quire show`: a document's content at a commit.

use clap::Args;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Document path.
    pub path: String,

    /// Commit hash (full or abbreviated).
    pub commit: String,
}

#[derive(Debug, Serialize)]
struct Snapshot {
    path: String,
    commit: String,
    content: String,
}

pub fn run(args: ShowArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let content = ctx.block_on(ctx.engine.show_at_commit(&path, &args.commit))?;
    let snapshot = Snapshot { path: path.to_string(), commit: args.commit, content };
    ctx.print(&snapshot, |s| s.content.trim_end_matches('\n').to_string())?;
    Ok(ExitCode::Success)
}
