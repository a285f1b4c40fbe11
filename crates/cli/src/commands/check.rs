// `quire check`: broken page links, broken images, unused images.

use clap::Args;
use quire_engine::batch::{BatchReport, FileFailure};
use quire_engine::links::{ImageLinkReport, PageLinkReport, UnusedImage};
use serde::Serialize;

use super::mv::plural;
use super::CommandContext;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Only check `[[...]]` page links.
    #[arg(long)]
    pub pages: bool,

    /// Only check image references.
    #[arg(long)]
    pub images: bool,

    /// Only list images nothing references.
    #[arg(long)]
    pub unused: bool,

    /// Assets directory for the unused-image scan (defaults to `[links] assets_dir`).
    #[arg(long)]
    pub assets: Option<String>,
}

impl CheckArgs {
    /// No selector means every check.
    fn selected(&self) -> (bool, bool, bool) {
        if !self.pages && !self.images && !self.unused {
            return (true, true, true);
        }
        (self.pages, self.images, self.unused)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageLinkReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageLinkReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unused_images: Option<Vec<UnusedImage>>,
    pub failures: Vec<FileFailure>,
}

impl CheckResult {
    fn has_findings(&self) -> bool {
        self.pages.as_ref().is_some_and(|p| !p.is_empty())
            || self.images.as_ref().is_some_and(|i| !i.is_empty())
            || self.unused_images.as_ref().is_some_and(|u| !u.is_empty())
    }

    fn take<T>(&mut self, report: BatchReport<T>) -> Vec<T> {
        self.failures.extend(report.failures);
        report.items
    }
}

pub fn run(args: CheckArgs, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let (pages, images, unused) = args.selected();
    let mut result = CheckResult::default();

    if pages {
        let report = ctx.block_on(ctx.engine.validate_all_page_links())?;
        result.pages = Some(result.take(report));
    }
    if images {
        let report = ctx.block_on(ctx.engine.validate_all_image_links())?;
        result.images = Some(result.take(report));
    }
    if unused {
        let report = ctx.block_on(ctx.engine.find_unused_images(args.assets.as_deref()))?;
        result.unused_images = Some(result.take(report));
    }

    ctx.print(&result, format_human)?;
    Ok(if !result.failures.is_empty() {
        ExitCode::Error
    } else if result.has_findings() {
        ExitCode::Findings
    } else {
        ExitCode::Success
    })
}

fn format_human(result: &CheckResult) -> String {
    let mut lines = Vec::new();

    if let Some(pages) = &result.pages {
        let count: usize = pages.iter().map(|file| file.broken_links.len()).sum();
        lines.push(format!("Broken page links: {count}"));
        for file in pages {
            for link in &file.broken_links {
                let target = link.resolved_path.as_ref().map_or("outside workspace".to_string(), |p| p.to_string());
                lines.push(format!("  {}:{}  [[{}]] → {target}", file.file_path, link.line_number, link.link_text));
            }
        }
    }

    if let Some(images) = &result.images {
        let count: usize = images.iter().map(|file| file.broken_images.len()).sum();
        lines.push(format!("Broken images: {count}"));
        for file in images {
            for image in &file.broken_images {
                lines.push(format!(
                    "  {}:{}  {} ({})",
                    file.file_path,
                    image.line_number,
                    image.image_src,
                    image.link_type.label()
                ));
            }
        }
    }

    if let Some(unused) = &result.unused_images {
        lines.push(format!("Unused images: {}", unused.len()));
        for image in unused {
            lines.push(format!(
                "  {}  (modified {})",
                image.file_path,
                image.last_modified.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    if !result.failures.is_empty() {
        lines.push(format!("Skipped {} unreadable file{}:", result.failures.len(), plural(result.failures.len())));
        for failure in &result.failures {
            lines.push(format!("  {}: {}", failure.path, failure.error));
        }
    }

    lines.join("\n")
}
