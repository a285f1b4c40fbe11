// Workspace link validation: broken page links, broken images, unused assets.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quire_common::links::{is_image_path, scan, LinkKind, LinkReference, LinkSyntax};
use quire_common::path::{composed, resolve_relative, DocumentPath};
use serde::Serialize;
use tracing::info;

use crate::batch::{for_each_document, BatchReport};
use crate::workspace::WorkspaceFs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub link_text: String,
    /// `None` when the link does not resolve inside the workspace.
    pub resolved_path: Option<DocumentPath>,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinkReport {
    pub file_path: DocumentPath,
    pub broken_links: Vec<BrokenLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenImage {
    pub image_src: String,
    pub resolved_path: Option<DocumentPath>,
    pub line_number: usize,
    pub link_type: LinkSyntax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageLinkReport {
    pub file_path: DocumentPath,
    pub broken_images: Vec<BrokenImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedImage {
    pub file_name: String,
    pub file_path: DocumentPath,
    pub last_modified: DateTime<Utc>,
}

pub struct LinkValidator {
    fs: Arc<dyn WorkspaceFs>,
    batch_size: usize,
}

impl LinkValidator {
    pub fn new(fs: Arc<dyn WorkspaceFs>, batch_size: usize) -> Self {
        Self { fs, batch_size }
    }

    /// Every `[[...]]` link whose target does not exist, grouped by file.
    pub async fn validate_all_page_links(&self) -> Result<BatchReport<PageLinkReport>> {
        let files = self.fs.list_markdown_files().await?;
        let report = for_each_document(files, self.batch_size, |path| async move {
            let content = self.fs.read_to_string(&path).await?;
            let mut broken_links = Vec::new();
            for link in scan(&content).into_iter().filter(|link| link.kind == LinkKind::Page) {
                let resolved = resolve_relative(&path, &link.path_text()).ok();
                if !self.target_exists(resolved.as_ref(), &link).await {
                    broken_links.push(BrokenLink {
                        line_number: link.line_number(&content),
                        link_text: link.raw_text,
                        resolved_path: resolved,
                    });
                }
            }
            Ok((!broken_links.is_empty()).then_some(PageLinkReport { file_path: path, broken_links }))
        })
        .await;

        info!(files = report.items.len(), failures = report.failures.len(), "page link validation finished");
        Ok(report)
    }

    /// Every local image reference whose file does not exist, grouped by file.
    pub async fn validate_all_image_links(&self) -> Result<BatchReport<ImageLinkReport>> {
        let files = self.fs.list_markdown_files().await?;
        let report = for_each_document(files, self.batch_size, |path| async move {
            let content = self.fs.read_to_string(&path).await?;
            let mut broken_images = Vec::new();
            for link in scan(&content).into_iter().filter(|link| link.kind == LinkKind::Image) {
                let resolved = resolve_relative(&path, &link.path_text()).ok();
                if !self.target_exists(resolved.as_ref(), &link).await {
                    broken_images.push(BrokenImage {
                        line_number: link.line_number(&content),
                        link_type: link.syntax,
                        image_src: link.raw_text,
                        resolved_path: resolved,
                    });
                }
            }
            Ok((!broken_images.is_empty()).then_some(ImageLinkReport { file_path: path, broken_images }))
        })
        .await;

        info!(files = report.items.len(), failures = report.failures.len(), "image link validation finished");
        Ok(report)
    }

    /// Images under `assets_dir` that no document references, by file name.
    /// Names are compared in NFC, so a link typed precomposed still matches
    /// an asset stored decomposed.
    ///
    /// Files whose references could not be read are listed in `failures`;
    /// images they reference may then show up as unused.
    pub async fn find_unused_images(&self, assets_dir: &str) -> Result<BatchReport<UnusedImage>> {
        let assets = DocumentPath::new(assets_dir)
            .with_context(|| format!("invalid assets directory: {assets_dir}"))?;

        let files = self.fs.list_markdown_files().await?;
        let references = for_each_document(files, self.batch_size, |path| {
            let assets = &assets;
            async move {
                let content = self.fs.read_to_string(&path).await?;
                let names: Vec<String> = scan(&content)
                    .iter()
                    .filter(|link| link.kind == LinkKind::Image)
                    .map(|link| composed(&reference_name(link, &path, assets)))
                    .collect();
                Ok(Some(names))
            }
        })
        .await;
        let used: HashSet<String> = references.items.into_iter().flatten().collect();

        let candidates: Vec<DocumentPath> = self
            .fs
            .list_files(Some(&assets))
            .await?
            .into_iter()
            .filter(|path| is_image_path(path.as_str()) && !used.contains(&composed(path.file_name())))
            .collect();

        let mut report = for_each_document(candidates, self.batch_size, |path| async move {
            let modified = self.fs.modified(&path).await?;
            Ok(Some(UnusedImage {
                file_name: path.file_name().to_string(),
                last_modified: DateTime::<Utc>::from(modified),
                file_path: path,
            }))
        })
        .await;
        report.items.sort_by(|a, b| a.file_name.cmp(&b.file_name).then_with(|| a.file_path.cmp(&b.file_path)));
        let mut failures = references.failures;
        failures.append(&mut report.failures);
        report.failures = failures;

        info!(
            assets = %assets,
            unused = report.items.len(),
            failures = report.failures.len(),
            "unused image scan finished"
        );
        Ok(report)
    }

    /// A link is satisfied by its resolved target, or for extensionless page
    /// links by the same path with `.md`.
    async fn target_exists(&self, resolved: Option<&DocumentPath>, link: &LinkReference) -> bool {
        let Some(resolved) = resolved else {
            return false;
        };
        if self.fs.exists(resolved).await {
            return true;
        }
        link.may_omit_markdown_extension() && self.fs.exists(&resolved.with_markdown_extension()).await
    }
}

/// The name a reference contributes to the "used" set: the bare file name
/// when it points into `assets`, the decoded text as written otherwise.
fn reference_name(link: &LinkReference, source: &DocumentPath, assets: &DocumentPath) -> String {
    let text = link.path_text();

    if let Ok(resolved) = resolve_relative(source, &text) {
        if resolved.is_within(assets) && resolved != *assets {
            return resolved.file_name().to_string();
        }
    }

    let mut rest: &str = &text;
    loop {
        if let Some(stripped) = rest.strip_prefix("../").or_else(|| rest.strip_prefix("./")) {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    match rest.strip_prefix(assets.as_str()).and_then(|tail| tail.strip_prefix('/')) {
        Some(tail) => tail.rsplit('/').next().unwrap_or(tail).to_string(),
        None => text.to_string(),
    }
}
