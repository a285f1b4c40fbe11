// `quire restore`: put a document back to a commit and record it.

use clap::Args;
use quire_engine::git::RestoreOutcome;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Document path.
    pub path: String,

    /// Commit to restore from.
    pub commit: String,
}

pub fn run(args: RestoreArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let outcome = ctx.block_on(ctx.engine.restore_to_commit(&path, &args.commit))?;
    ctx.print(&outcome, format_human)?;
    Ok(ExitCode::Success)
}

fn format_human(outcome: &RestoreOutcome) -> String {
    match outcome {
        RestoreOutcome::Committed { message } => message.clone(),
        RestoreOutcome::Unchanged => "Already matches that commit; nothing to restore.".into(),
    }
}
