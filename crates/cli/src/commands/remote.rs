// `quire remote`: commit identity and remote URL.

use clap::Args;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct RemoteArgs {
    /// Remote URL to push to and pull from.
    pub url: String,

    /// Commit author name (defaults to `[author] name` in ~/.quire/config.toml).
    #[arg(long)]
    pub name: Option<String>,

    /// Commit author email (defaults to `[author] email` in ~/.quire/config.toml).
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
struct Configured {
    remote: String,
    url: String,
}

pub fn run(args: RemoteArgs, mut ctx: CommandContext) -> anyhow::Result<ExitCode> {
    ctx.runtime.block_on(ctx.engine.configure_remote(
        &args.url,
        args.name.as_deref(),
        args.email.as_deref(),
    ))?;

    let configured = Configured { remote: ctx.engine.config().git.remote.clone(), url: args.url };
    ctx.print(&configured, |c| format!("Remote {} set to {}.", c.remote, c.url))?;
    Ok(ExitCode::Success)
}
