use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::log::{parse_log, short_hash, CommitInfo, LOG_FORMAT};
use super::status::{parse_porcelain_z, GitStatus, StatusEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A failed git invocation, carrying the tool's own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOperationError {
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String, stdout: String },
    UnexpectedOutput { command: String, output: String },
}

impl GitOperationError {
    /// Everything git printed, for conflict pattern matching.
    pub fn message(&self) -> String {
        match self {
            Self::SpawnFailed { message, .. } => message.clone(),
            Self::CommandFailed { stderr, stdout, .. } => {
                [stderr.trim(), stdout.trim()].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n")
            }
            Self::UnexpectedOutput { output, .. } => output.clone(),
        }
    }
}

impl Display for GitOperationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            Self::CommandFailed { command, code, .. } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, self.message())
            }
            Self::UnexpectedOutput { command, output } => {
                write!(f, "unexpected output from `{command}`: {}", output.trim())
            }
        }
    }
}

impl Error for GitOperationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            // Never block on a credential or editor prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            .output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Result of restoring a file to an earlier commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Committed { message: String },
    /// The file already matched that commit; nothing to record.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    // ── Status ──────────────────────────────────────────────────────

    pub fn status(&self) -> Result<GitStatus, GitOperationError> {
        let output = self.run(args(&["status", "--porcelain=v1", "-z", "--untracked-files=all"]))?;
        parse_status(output, "git status")
    }

    /// Status of a single path; `None` when it has no local changes.
    pub fn file_status(&self, path: &str) -> Result<Option<StatusEntry>, GitOperationError> {
        let output = self.run(args(&[
            "status",
            "--porcelain=v1",
            "-z",
            "--untracked-files=all",
            "--",
            path,
        ]))?;
        let status = parse_status(output, "git status")?;
        Ok(status.entries.into_iter().find(|entry| entry.path == path))
    }

    /// A rebase stopped mid-way (typically on a conflict).
    pub fn is_rebase_in_progress(&self) -> bool {
        let git_dir = self.repo_path.join(".git");
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }

    // ── Commit / sync ───────────────────────────────────────────────

    /// Stage everything and commit. Returns `false` when there was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<bool, GitOperationError> {
        self.run(args(&["add", "-A"]))?;
        let staged = self.run(args(&["diff", "--cached", "--name-only"]))?;
        if staged.stdout.trim().is_empty() {
            return Ok(false);
        }
        self.run(args(&["commit", "-m", message]))?;
        Ok(true)
    }

    /// Pull with rebase. Returns `false` when already up to date or when the
    /// remote branch does not exist yet.
    pub fn pull_rebase(&self, remote: &str, branch: &str) -> Result<bool, GitOperationError> {
        match self.run(args(&["pull", "--rebase", remote, branch])) {
            Ok(output) => Ok(!output.stdout.to_lowercase().contains("up to date")),
            Err(error) if error.message().contains("couldn't find remote ref") => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<(), GitOperationError> {
        self.run(args(&["push", remote, &format!("HEAD:{branch}")])).map(|_| ())
    }

    pub fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitOperationError> {
        self.run(args(&["fetch", remote, branch])).map(|_| ())
    }

    /// Local commits not yet on `remote/branch`. A missing remote branch
    /// counts as unpushed whenever `HEAD` exists.
    pub fn has_unpushed_commits(&self, remote: &str, branch: &str) -> Result<bool, GitOperationError> {
        let range = format!("{remote}/{branch}..HEAD");
        match self.run(args(&["rev-list", "--count", &range])) {
            Ok(output) => {
                let count = output.stdout.trim().parse::<u64>().map_err(|_| {
                    GitOperationError::UnexpectedOutput {
                        command: format!("git rev-list --count {range}"),
                        output: output.stdout.clone(),
                    }
                })?;
                Ok(count > 0)
            }
            Err(GitOperationError::CommandFailed { .. }) => {
                Ok(self.run(args(&["rev-parse", "--verify", "--quiet", "HEAD"])).is_ok())
            }
            Err(error) => Err(error),
        }
    }

    pub fn rebase_abort(&self) -> Result<(), GitOperationError> {
        self.run(args(&["rebase", "--abort"])).map(|_| ())
    }

    pub fn rebase_continue(&self) -> Result<(), GitOperationError> {
        self.run(args(&["-c", "core.editor=true", "rebase", "--continue"])).map(|_| ())
    }

    /// Drop the commit a stopped rebase is applying (used when resolving left
    /// nothing to commit).
    pub fn rebase_skip(&self) -> Result<(), GitOperationError> {
        self.run(args(&["rebase", "--skip"])).map(|_| ())
    }

    // ── History ─────────────────────────────────────────────────────

    pub fn log_for_file(&self, path: &str, limit: usize) -> Result<Vec<CommitInfo>, GitOperationError> {
        let limit = limit.to_string();
        let output = self.run(args(&["log", "-n", &limit, "--follow", LOG_FORMAT, "--", path]))?;
        parse_log(&output.stdout).map_err(|record| GitOperationError::UnexpectedOutput {
            command: "git log".to_string(),
            output: record,
        })
    }

    pub fn show_file_at_commit(&self, path: &str, hash: &str) -> Result<String, GitOperationError> {
        self.run(args(&["show", &format!("{hash}:{path}")])).map(|output| output.stdout)
    }

    pub fn diff_commits(&self, path: &str, from: &str, to: &str) -> Result<String, GitOperationError> {
        self.run(args(&["diff", "--no-color", from, to, "--", path])).map(|output| output.stdout)
    }

    pub fn diff_working_tree(&self, path: &str) -> Result<String, GitOperationError> {
        self.run(args(&["diff", "--no-color", "HEAD", "--", path])).map(|output| output.stdout)
    }

    // ── Restore / discard ───────────────────────────────────────────

    /// Restore `path` to its content at `hash`, stage it and commit.
    ///
    /// Not rolled back on failure: a failed commit leaves the restored
    /// content in the working tree.
    pub fn restore_file_from_commit(
        &self,
        path: &str,
        hash: &str,
    ) -> Result<RestoreOutcome, GitOperationError> {
        self.restore_file_from_commit_at(path, hash, Utc::now())
    }

    fn restore_file_from_commit_at(
        &self,
        path: &str,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome, GitOperationError> {
        self.run(args(&["checkout", hash, "--", path]))?;
        self.run(args(&["add", "--", path]))?;
        let staged = self.run(args(&["diff", "--cached", "--name-only", "--", path]))?;
        if staged.stdout.trim().is_empty() {
            return Ok(RestoreOutcome::Unchanged);
        }

        let name = path.rsplit('/').next().unwrap_or(path);
        let message = format!(
            "Restore: {name} to {} at {}",
            short_hash(hash),
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.run(args(&["commit", "-m", &message, "--", path]))?;
        Ok(RestoreOutcome::Committed { message })
    }

    /// Throw away staged and unstaged changes to `path`.
    pub fn discard_working_changes(&self, path: &str) -> Result<(), GitOperationError> {
        self.run(args(&["restore", "--source=HEAD", "--staged", "--worktree", "--", path]))
            .map(|_| ())
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Set the commit identity and point `remote` at `url` (adding it if needed).
    pub fn configure_identity_and_remote(
        &self,
        name: &str,
        email: &str,
        remote: &str,
        url: &str,
    ) -> Result<(), GitOperationError> {
        self.run(args(&["config", "user.name", name]))?;
        self.run(args(&["config", "user.email", email]))?;
        match self.run(args(&["remote", "get-url", remote])) {
            Ok(output) if output.stdout.trim() == url => Ok(()),
            Ok(_) => self.run(args(&["remote", "set-url", remote, url])).map(|_| ()),
            Err(GitOperationError::CommandFailed { .. }) => {
                self.run(args(&["remote", "add", remote, url])).map(|_| ())
            }
            Err(error) => Err(error),
        }
    }

    fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitOperationError> {
        let command = format!("git {}", args.join(" "));
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            GitOperationError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        Err(GitOperationError::CommandFailed {
            command,
            code: result.code,
            stderr: result.stderr,
            stdout: result.stdout,
        })
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn parse_status(output: GitCommandOutput, command: &str) -> Result<GitStatus, GitOperationError> {
    parse_porcelain_z(&output.stdout).ok_or_else(|| GitOperationError::UnexpectedOutput {
        command: command.to_string(),
        output: output.stdout,
    })
}
