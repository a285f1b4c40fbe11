// CLI subcommand dispatch.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use quire_common::path::DocumentPath;
use quire_engine::WorkspaceEngine;
use serde::Serialize;
use tracing::debug;

use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

pub mod check;
pub mod diff;
pub mod discard;
pub mod history;
pub mod mv;
pub mod remote;
pub mod restore;
pub mod rm;
pub mod show;
pub mod status;
pub mod sync;

/// Flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Move or rename a file or folder and rewrite every link to it
    Mv(mv::MvArgs),
    /// Delete a file or folder and close its open tabs
    Rm(rm::RmArgs),
    /// Report broken page links, broken images and unused images
    Check(check::CheckArgs),
    /// Commit, pull with rebase and push the workspace
    Sync(sync::SyncArgs),
    /// Show sync status of documents
    Status(status::StatusArgs),
    /// Show commit history of a document
    History(history::HistoryArgs),
    /// Show a document's diff against HEAD or between two commits
    Diff(diff::DiffArgs),
    /// Print a document as of a commit
    Show(show::ShowArgs),
    /// Restore a document to a commit and record it
    Restore(restore::RestoreArgs),
    /// Throw away local changes to a document
    Discard(discard::DiscardArgs),
    /// Configure the commit identity and remote URL
    Remote(remote::RemoteArgs),
}

pub fn run(cmd: Command, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    let ctx = CommandContext::open(global)?;
    match cmd {
        Command::Mv(args) => mv::run(args, &ctx),
        Command::Rm(args) => rm::run(args, &ctx),
        Command::Check(args) => check::run(args, &ctx),
        Command::Sync(args) => sync::run(args, &ctx),
        Command::Status(args) => status::run(args, &ctx),
        Command::History(args) => history::run(args, &ctx),
        Command::Diff(args) => diff::run(args, &ctx),
        Command::Show(args) => show::run(args, &ctx),
        Command::Restore(args) => restore::run(args, &ctx),
        Command::Discard(args) => discard::run(args, &ctx),
        Command::Remote(args) => remote::run(args, ctx),
    }
}

/// The opened workspace plus the runtime its async operations run on.
pub struct CommandContext {
    pub format: OutputFormat,
    pub engine: WorkspaceEngine,
    runtime: tokio::runtime::Runtime,
}

impl CommandContext {
    fn open(global: &GlobalArgs) -> anyhow::Result<Self> {
        let root = match &global.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("failed to read current directory")?,
        };
        let engine = WorkspaceEngine::open(&root)
            .with_context(|| format!("failed to open workspace at {}", root.display()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        debug!(root = %engine.workspace().root().display(), "workspace opened");
        Ok(Self { format: OutputFormat::detect(global.json), engine, runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Workspace-relative or absolute user input as a document path.
    pub fn path(&self, input: &str) -> anyhow::Result<DocumentPath> {
        Ok(self.engine.document_path(input)?)
    }

    pub fn print<T, F>(&self, value: &T, human_fn: F) -> anyhow::Result<()>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        output::print_output(self.format, value, human_fn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        global: GlobalArgs,
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = TestCli::try_parse_from(["quire", "sync", "--json", "--root", "/tmp/notes"]).unwrap();
        assert!(cli.global.json);
        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/notes")));
        assert!(matches!(cli.command, Command::Sync(_)));
    }

    #[test]
    fn mv_requires_both_paths() {
        assert!(TestCli::try_parse_from(["quire", "mv", "a.md"]).is_err());
        assert!(TestCli::try_parse_from(["quire", "mv", "a.md", "b/a.md"]).is_ok());
    }

    #[test]
    fn sync_abort_conflicts_with_message() {
        assert!(TestCli::try_parse_from(["quire", "sync", "--abort", "-m", "x"]).is_err());
    }

    fn global(root: &std::path::Path) -> GlobalArgs {
        GlobalArgs { root: Some(root.to_path_buf()), json: true }
    }

    #[test]
    fn mv_rewrites_links_in_the_workspace() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/A.md"), "# A\n").unwrap();
        std::fs::write(tmp.path().join("docs/B.md"), "See [[A.md]].\n").unwrap();

        let args = mv::MvArgs { from: "docs/A.md".into(), to: "docs/guides/A.md".into(), links_only: false };
        let code = run(Command::Mv(args), &global(tmp.path())).unwrap();

        assert_eq!(code, ExitCode::Success);
        assert!(tmp.path().join("docs/guides/A.md").is_file());
        let referrer = std::fs::read_to_string(tmp.path().join("docs/B.md")).unwrap();
        assert_eq!(referrer, "See [[guides/A.md]].\n");
    }

    #[test]
    fn check_reports_findings_through_the_exit_code() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("index.md"), "[[missing.md]]\n").unwrap();

        let args = check::CheckArgs { pages: true, images: false, unused: false, assets: None };
        let code = run(Command::Check(args), &global(tmp.path())).unwrap();

        assert_eq!(code, ExitCode::Findings);
    }

    #[test]
    fn moving_a_missing_path_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let args = mv::MvArgs { from: "nope.md".into(), to: "b.md".into(), links_only: false };
        let error = run(Command::Mv(args), &global(tmp.path())).unwrap_err();
        assert_eq!(ExitCode::from_error(&error), ExitCode::NotFound);
    }

    #[test]
    fn diff_range_needs_both_ends() {
        assert!(TestCli::try_parse_from(["quire", "diff", "a.md", "--from", "abc"]).is_err());
        assert!(TestCli::try_parse_from(["quire", "diff", "a.md", "--from", "abc", "--to", "def"]).is_ok());
    }
}
