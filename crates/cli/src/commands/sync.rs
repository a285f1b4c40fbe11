// `quire sync`: one commit/pull/push cycle, or abort a stopped one.

use chrono::{SecondsFormat, Utc};
use clap::Args;
use quire_common::sync::SyncStatus;
use quire_engine::sync::{SyncOutcome, SyncTrigger};
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Commit message (defaults to a timestamped one).
    #[arg(short, long)]
    pub message: Option<String>,

    /// Abort a rebase stopped by conflicts and restore local commits.
    #[arg(long, conflicts_with = "message")]
    pub abort: bool,
}

#[derive(Debug, Serialize)]
struct Aborted {
    aborted: bool,
}

pub fn run(args: SyncArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    if args.abort {
        ctx.block_on(ctx.engine.abort_sync())?;
        ctx.print(&Aborted { aborted: true }, |_| "Sync aborted; local commits restored.".to_string())?;
        return Ok(ExitCode::Success);
    }

    let message = args
        .message
        .unwrap_or_else(|| format!("Sync at {}", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)));
    let outcome = ctx.block_on(ctx.engine.sync_workspace(&message, SyncTrigger::Manual))?;

    ctx.print(&outcome, format_human)?;
    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &SyncOutcome) -> ExitCode {
    match outcome.status {
        SyncStatus::Conflict => ExitCode::Conflict,
        SyncStatus::Error => ExitCode::Git,
        _ => ExitCode::Success,
    }
}

fn format_human(outcome: &SyncOutcome) -> String {
    let mut lines = Vec::new();
    match outcome.status {
        SyncStatus::Conflict => {
            lines.push("Sync stopped: conflicts need resolving.".to_string());
            for path in &outcome.conflicted_paths {
                lines.push(format!("  {path}"));
            }
            lines.push("Resolve with `quire discard <path>`, or run `quire sync --abort`.".to_string());
        }
        SyncStatus::Error => {
            lines.push("Sync failed.".to_string());
        }
        _ => {
            let steps: Vec<&str> = [
                (outcome.committed, "committed"),
                (outcome.pulled, "pulled"),
                (outcome.pushed, "pushed"),
            ]
            .into_iter()
            .filter_map(|(done, label)| done.then_some(label))
            .collect();
            if steps.is_empty() {
                lines.push("Already in sync.".to_string());
            } else {
                lines.push(format!("Synced ({}).", steps.join(", ")));
            }
        }
    }
    if let Some(error) = &outcome.error {
        lines.push(format!("  {}", error.trim().replace('\n', "\n  ")));
    }
    lines.join("\n")
}
