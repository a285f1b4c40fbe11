// Markdown `![alt](src)` and HTML `<img src>` image references.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// An image source found in markdown or inline HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub src: String,
    pub html: bool,
    /// Byte offset of `![` or `<img`.
    pub start_offset: usize,
    /// Byte range of `src` inside the source text.
    pub src_span: Range<usize>,
}

fn markdown_image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"!\[[^\]]*\]\(\s*(?:<([^>]+)>|([^)\s]+))(?:\s+"[^"]*")?\s*\)"#)
            .expect("markdown image pattern should compile")
    })
}

fn html_image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("html image pattern should compile")
    })
}

/// Parse markdown and HTML image sources, in document order.
pub fn parse_image_sources(markdown: &str) -> Vec<ImageSource> {
    let mut sources = Vec::new();

    for captures in markdown_image_pattern().captures_iter(markdown) {
        let (Some(whole), Some(src)) = (captures.get(0), captures.get(1).or(captures.get(2)))
        else {
            continue;
        };
        sources.push(ImageSource {
            src: src.as_str().to_string(),
            html: false,
            start_offset: whole.start(),
            src_span: src.range(),
        });
    }

    for captures in html_image_pattern().captures_iter(markdown) {
        let (Some(whole), Some(src)) = (captures.get(0), captures.get(1).or(captures.get(2)))
        else {
            continue;
        };
        if src.as_str().trim().is_empty() {
            continue;
        }
        sources.push(ImageSource {
            src: src.as_str().to_string(),
            html: true,
            start_offset: whole.start(),
            src_span: src.range(),
        });
    }

    sources.sort_by_key(|source| source.start_offset);
    sources
}
