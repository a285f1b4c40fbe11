// `quire mv`: move a file or folder and rewrite links.

use clap::Args;
use quire_engine::links::MoveReport;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct MvArgs {
    /// Current path of the file or folder.
    pub from: String,

    /// Destination path.
    pub to: String,

    /// The move already happened on disk; only rewrite links.
    #[arg(long)]
    pub links_only: bool,
}

pub fn run(args: MvArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let from = ctx.path(&args.from)?;
    let to = ctx.path(&args.to)?;
    let root = ctx.engine.workspace();
    let is_folder = if args.links_only { root.absolute(&to).is_dir() } else { root.absolute(&from).is_dir() };

    let report = if args.links_only {
        ctx.block_on(ctx.engine.propagate_move(&from, &to, is_folder))?
    } else {
        ctx.block_on(ctx.engine.move_path(&from, &to, is_folder))?
    };

    ctx.print(&report, format_human)?;
    Ok(if report.failures.is_empty() { ExitCode::Success } else { ExitCode::Error })
}

fn format_human(report: &MoveReport) -> String {
    let mut lines = vec![format!(
        "Updated {} link{} in {} file{}.",
        report.links_updated,
        plural(report.links_updated),
        report.files_updated,
        plural(report.files_updated)
    )];
    if !report.failures.is_empty() {
        lines.push(format!("Could not update {} file{}:", report.failures.len(), plural(report.failures.len())));
        for failure in &report.failures {
            lines.push(format!("  {}: {}", failure.path, failure.error));
        }
    }
    lines.join("\n")
}

pub(crate) fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
