// `quire history`: commits touching a document.

use clap::Args;
use quire_engine::git::CommitInfo;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Document path.
    pub path: String,

    /// Maximum number of commits to show.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(args: HistoryArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let path = ctx.path(&args.path)?;
    let commits = ctx.block_on(ctx.engine.get_history(&path, args.limit))?;
    ctx.print(&commits, |commits| format_human(commits))?;
    Ok(ExitCode::Success)
}

fn format_human(commits: &[CommitInfo]) -> String {
    if commits.is_empty() {
        return "No history.".into();
    }
    commits
        .iter()
        .map(|commit| {
            format!(
                "{}  {}  {:<16}  {}",
                commit.short_hash,
                commit.date.format("%Y-%m-%d %H:%M"),
                commit.author,
                commit.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn human_format_one_line_per_commit() {
        let commits = vec![CommitInfo {
            hash: "0123456789abcdef0123456789abcdef01234567".into(),
            short_hash: "01234567".into(),
            author: "Ada".into(),
            date: DateTime::parse_from_rfc3339("2026-02-03T10:15:00+01:00").unwrap(),
            message: "Sync at 2026-02-03T09:15:00Z".into(),
        }];
        assert_eq!(
            format_human(&commits),
            "01234567  2026-02-03 10:15  Ada               Sync at 2026-02-03T09:15:00Z"
        );
    }

    #[test]
    fn human_format_empty() {
        assert_eq!(format_human(&[]), "No history.");
    }
}
