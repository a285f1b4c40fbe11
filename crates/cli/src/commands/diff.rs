// `quire diff`: a document's diff against HEAD or between two commits.

use clap::Args;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Document path.
    pub path: String,

    /// Older commit of the range.
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Newer commit of the range.
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiffResult {
    pub path: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub diff: String,
}

pub fn run(args: DiffArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let diff = ctx.block_on(ctx.engine.get_diff(&path, args.from.as_deref(), args.to.as_deref()))?;
    let result = DiffResult { path: path.to_string(), from: args.from, to: args.to, diff };
    ctx.print(&result, format_human)?;
    Ok(ExitCode::Success)
}

fn format_human(result: &DiffResult) -> String {
    if result.diff.trim().is_empty() {
        return format!("No changes to {}.", result.path);
    }
    result.diff.trim_end().to_string()
}
