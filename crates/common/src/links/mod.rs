// Link scanning: wiki links, embeds and image references with byte offsets.

pub mod code;
pub mod image;
pub mod wiki;

use std::borrow::Cow;
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub use image::{parse_image_sources, ImageSource};
pub use wiki::{parse_wiki_links, WikiLink};

/// File extensions treated as image assets.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "avif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Page,
    Image,
}

/// How a link was written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkSyntax {
    /// `[[target]]`
    WikiLink,
    /// `![[target]]`
    WikiEmbed,
    /// `![alt](src)`
    Markdown,
    /// `<img src="...">`
    Html,
}

impl LinkSyntax {
    /// Short label used in diagnostics (`markdown`, `html`, `wiki-embed`, `wiki-link`).
    pub fn label(self) -> &'static str {
        match self {
            LinkSyntax::WikiLink => "wiki-link",
            LinkSyntax::WikiEmbed => "wiki-embed",
            LinkSyntax::Markdown => "markdown",
            LinkSyntax::Html => "html",
        }
    }
}

/// One link occurrence inside a document's raw text.
///
/// `raw_text` is relative to the directory of the document that was scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub raw_text: String,
    pub kind: LinkKind,
    pub syntax: LinkSyntax,
    /// Byte offset of the start of the link token.
    pub byte_offset: usize,
    /// Byte range of `raw_text` in the scanned content.
    pub target_span: Range<usize>,
}

impl LinkReference {
    /// 1-based line number of this link within `content`.
    pub fn line_number(&self, content: &str) -> usize {
        line_number(content, self.byte_offset)
    }

    /// Link text ready for path resolution (`%20` decoded for markdown/html images).
    pub fn path_text(&self) -> Cow<'_, str> {
        match self.syntax {
            LinkSyntax::Markdown | LinkSyntax::Html => decode_spaces(&self.raw_text),
            LinkSyntax::WikiLink | LinkSyntax::WikiEmbed => Cow::Borrowed(&self.raw_text),
        }
    }

    /// Encode replacement path text the way this link was originally written.
    pub fn encode_like_original(&self, path_text: &str) -> String {
        if self.raw_text.contains("%20") {
            path_text.replace(' ', "%20")
        } else {
            path_text.to_string()
        }
    }

    /// Wiki links may omit the `.md` extension of their target.
    pub fn may_omit_markdown_extension(&self) -> bool {
        self.kind == LinkKind::Page && !has_extension(&self.raw_text)
    }
}

/// A single replacement in a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Find every wiki link, embed and local image reference in `content`.
///
/// Image sources that are absolute URLs (`http://`, `https://`) or `data:`
/// URIs are skipped, as is anything inside fenced blocks or inline code.
/// Results are in document order.
pub fn scan(content: &str) -> Vec<LinkReference> {
    let mut links: Vec<LinkReference> = parse_wiki_links(content)
        .into_iter()
        .map(|link| {
            let image = link.embed && is_image_path(&link.target);
            LinkReference {
                kind: if image { LinkKind::Image } else { LinkKind::Page },
                syntax: if link.embed { LinkSyntax::WikiEmbed } else { LinkSyntax::WikiLink },
                byte_offset: link.start_offset,
                target_span: link.target_span,
                raw_text: link.target,
            }
        })
        .collect();

    links.extend(parse_image_sources(content).into_iter().filter_map(|source| {
        let src = source.src.trim();
        if src.is_empty() || is_external_source(src) {
            return None;
        }
        Some(LinkReference {
            raw_text: source.src.clone(),
            kind: LinkKind::Image,
            syntax: if source.html { LinkSyntax::Html } else { LinkSyntax::Markdown },
            byte_offset: source.start_offset,
            target_span: source.src_span,
        })
    }));

    let code = code::code_ranges(content);
    links.retain(|link| !code.iter().any(|range| range.contains(&link.byte_offset)));
    links.sort_by_key(|link| link.byte_offset);
    links
}

/// 1-based line number for a byte offset: count of `\n` before it, plus one.
pub fn line_number(content: &str, byte_offset: usize) -> usize {
    let end = byte_offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|byte| **byte == b'\n').count() + 1
}

/// Apply non-overlapping edits, returning the rewritten text.
pub fn apply_edits(content: &str, edits: &[TextEdit]) -> String {
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by_key(|edit| std::cmp::Reverse(edit.span.start));

    let mut text = content.to_string();
    for edit in ordered {
        text.replace_range(edit.span.clone(), &edit.replacement);
    }
    text
}

/// True for `http(s)://` URLs and `data:` URIs.
pub fn is_external_source(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// True when the final path component carries an image extension.
pub fn is_image_path(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn has_extension(path: &str) -> bool {
    extension_of(path).is_some()
}

fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn decode_spaces(text: &str) -> Cow<'_, str> {
    if text.contains("%20") {
        Cow::Owned(text.replace("%20", " "))
    } else {
        Cow::Borrowed(text)
    }
}
