// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` forces JSON output regardless of terminal.

use quire_engine::sync::SyncError;
use quire_engine::EngineError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer.
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line("error", message, io::stderr().is_terminal());
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    let engine_error = error.chain().find_map(|cause| cause.downcast_ref::<EngineError>());
    match engine_error {
        Some(EngineError::NotFound(path)) => {
            return ("PATH_NOT_FOUND", format!("{path} does not exist in this workspace"));
        }
        Some(EngineError::AlreadyExists(path)) => {
            return ("PATH_EXISTS", format!("{path} already exists. Pick another destination"));
        }
        Some(EngineError::OutsideWorkspace(input)) => {
            return ("OUTSIDE_WORKSPACE", format!("{input} is not inside the workspace. Pass --root"));
        }
        Some(EngineError::MissingIdentity) => {
            return (
                "MISSING_IDENTITY",
                "No commit author configured. Run: quire remote <url> --name <name> --email <email>"
                    .to_string(),
            );
        }
        Some(EngineError::Sync(SyncError::AlreadyRunning)) => {
            return ("SYNC_RUNNING", "A sync is already running for this workspace. Try again shortly".to_string());
        }
        _ => {}
    }

    let lower = message.to_ascii_lowercase();
    if lower.contains("not a git repository") {
        return ("NOT_A_REPOSITORY", "The workspace is not a git repository. Run: git init".to_string());
    }
    if lower.contains("could not read from remote") || lower.contains("unable to access") {
        return ("REMOTE_UNREACHABLE", format!("Could not reach the remote. Check: quire remote\n{message}"));
    }
    if engine_error.is_some_and(|err| matches!(err, EngineError::Git(_))) {
        return ("GIT_FAILED", message);
    }

    ("ERROR", message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{ANSI_RED}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
