// `quire status`: sync status of documents.

use clap::Args;
use quire_common::path::DocumentPath;
use quire_common::sync::SyncStatus;
use serde::Serialize;

use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Documents to report (defaults to every file git sees as changed).
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub path: DocumentPath,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub documents: Vec<DocumentStatus>,
}

pub fn run(args: StatusArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let paths = if args.paths.is_empty() {
        changed_paths(ctx)?
    } else {
        args.paths.iter().map(|input| ctx.path(input)).collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let status = ctx.block_on(ctx.engine.get_sync_status(&path))?;
        documents.push(DocumentStatus { path, status });
    }

    let result = StatusResult { documents };
    ctx.print(&result, format_human)?;
    let conflicted = result.documents.iter().any(|doc| doc.status == SyncStatus::Conflict);
    Ok(if conflicted { ExitCode::Conflict } else { ExitCode::Success })
}

/// Existing markdown files with local changes, per `git status`.
fn changed_paths(ctx: &CommandContext) -> anyhow::Result<Vec<DocumentPath>> {
    let status = ctx.block_on(ctx.engine.git().run(|git| git.status()))?;
    let root = ctx.engine.workspace();
    let mut paths: Vec<DocumentPath> = status
        .entries
        .iter()
        .filter_map(|entry| DocumentPath::new(&entry.path).ok())
        .filter(|path| path.is_markdown() && root.absolute(path).is_file())
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn format_human(result: &StatusResult) -> String {
    if result.documents.is_empty() {
        return "Everything is synced.".into();
    }
    let width = result.documents.iter().map(|doc| doc.status.as_str().len()).max().unwrap_or(0);
    result
        .documents
        .iter()
        .map(|doc| format!("{:<width$}  {}", doc.status.as_str(), doc.path))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{self, OutputFormat};

    fn sample_result() -> StatusResult {
        StatusResult {
            documents: vec![
                DocumentStatus { path: DocumentPath::new("a.md").unwrap(), status: SyncStatus::OutOfDate },
                DocumentStatus { path: DocumentPath::new("docs/b.md").unwrap(), status: SyncStatus::Conflict },
            ],
        }
    }

    #[test]
    fn human_format_aligns_statuses() {
        assert_eq!(format_human(&sample_result()), "out-of-date  a.md\nconflict     docs/b.md");
    }

    #[test]
    fn human_format_empty() {
        assert_eq!(format_human(&StatusResult { documents: vec![] }), "Everything is synced.");
    }

    #[test]
    fn json_uses_kebab_case_statuses() {
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &sample_result(), format_human).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["documents"][0]["status"], "out-of-date");
        assert_eq!(parsed["documents"][1]["path"], "docs/b.md");
    }
}
