// `quire rm`: delete a file or folder.

use clap::Args;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct RmArgs {
    /// File or folder to delete.
    pub path: String,
}

#[derive(Debug, Serialize)]
struct Deleted {
    path: String,
    is_folder: bool,
}

pub fn run(args: RmArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let is_folder = ctx.engine.workspace().absolute(&path).is_dir();
    ctx.block_on(ctx.engine.delete_path(&path, is_folder))?;

    let deleted = Deleted { path: path.to_string(), is_folder };
    ctx.print(&deleted, |d| format!("Deleted {}{}", d.path, if d.is_folder { "/" } else { "" }))?;
    Ok(ExitCode::Success)
}
