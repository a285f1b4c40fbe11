// Wiki-style link parsing (`[[target]]` syntax).
//
// Supported forms:
// - [[target]]
// - [[target|alias]]
// - [[target#heading]]
// - [[target#heading|alias]]
// - ![[target]] (embed)

use std::ops::Range;

/// A parsed wiki-style link from markdown content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Target text before any `#heading` fragment or `|alias`.
    pub target: String,
    /// Optional section fragment after `#`.
    pub heading: Option<String>,
    /// Optional display alias after `|`.
    pub alias: Option<String>,
    /// Raw inner text between `[[` and `]]`, trimmed.
    pub raw: String,
    /// True for `![[...]]` embeds.
    pub embed: bool,
    /// Byte offset of the opening `[[` (or `!` for embeds).
    pub start_offset: usize,
    /// Byte offset just after the closing `]]`.
    pub end_offset: usize,
    /// Byte range of `target` inside the source text.
    pub target_span: Range<usize>,
}

/// Parse wiki links from markdown, in document order.
pub fn parse_wiki_links(markdown: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    let bytes = markdown.as_bytes();
    let mut index = 0usize;

    while index + 1 < bytes.len() {
        if bytes[index] == b'[' && bytes[index + 1] == b'[' {
            let start = index;
            index += 2;

            let mut close = None;
            while index + 1 < bytes.len() {
                if bytes[index] == b']' && bytes[index + 1] == b']' {
                    close = Some(index);
                    break;
                }
                index += 1;
            }

            let Some(close_start) = close else {
                break;
            };

            let embed = start > 0 && bytes[start - 1] == b'!';
            if let Some(link) = parse_inner_link(markdown, start + 2..close_start, embed) {
                links.push(link);
            }
            index = close_start + 2;
            continue;
        }

        index += 1;
    }

    links
}

fn parse_inner_link(markdown: &str, inner_span: Range<usize>, embed: bool) -> Option<WikiLink> {
    let inner = &markdown[inner_span.clone()];
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return None;
    }

    let target_end = inner.find(|c: char| c == '|' || c == '#').unwrap_or(inner.len());
    let target_segment = &inner[..target_end];
    let target = target_segment.trim();
    if target.is_empty() {
        return None;
    }
    let leading = target_segment.len() - target_segment.trim_start().len();
    let target_start = inner_span.start + leading;

    let rest = &inner[target_end..];
    let (heading_part, alias_part) = match rest.split_once('|') {
        Some((left, right)) => (left, Some(right.trim())),
        None => (rest, None),
    };
    let heading = heading_part
        .strip_prefix('#')
        .map(str::trim)
        .and_then(|value| (!value.is_empty()).then(|| value.to_string()));
    let alias = alias_part.and_then(|value| (!value.is_empty()).then(|| value.to_string()));

    let start_offset = if embed { inner_span.start - 3 } else { inner_span.start - 2 };

    Some(WikiLink {
        target: target.to_string(),
        heading,
        alias,
        raw: trimmed.to_string(),
        embed,
        start_offset,
        end_offset: inner_span.end + 2,
        target_span: target_start..target_start + target.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::parse_wiki_links;

    #[test]
    fn parses_basic_target_link() {
        let links = parse_wiki_links("See [[docs/Auth.md]].");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "docs/Auth.md");
        assert_eq!(links[0].heading, None);
        assert_eq!(links[0].alias, None);
        assert!(!links[0].embed);
    }

    #[test]
    fn parses_heading_and_alias_together() {
        let links = parse_wiki_links("See [[Auth.md#PKCE|OAuth PKCE]].");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Auth.md");
        assert_eq!(links[0].heading.as_deref(), Some("PKCE"));
        assert_eq!(links[0].alias.as_deref(), Some("OAuth PKCE"));
    }

    #[test]
    fn alias_may_contain_hash() {
        let links = parse_wiki_links("[[A.md|Issue #4]]");
        assert_eq!(links[0].target, "A.md");
        assert_eq!(links[0].heading, None);
        assert_eq!(links[0].alias.as_deref(), Some("Issue #4"));
    }

    #[test]
    fn target_span_points_at_trimmed_target() {
        let markdown = "x [[  ../docs/api.md  #  auth  |  API  ]]";
        let links = parse_wiki_links(markdown);

        assert_eq!(links.len(), 1);
        assert_eq!(&markdown[links[0].target_span.clone()], "../docs/api.md");
        assert_eq!(links[0].heading.as_deref(), Some("auth"));
        assert_eq!(links[0].alias.as_deref(), Some("API"));
    }

    #[test]
    fn detects_embeds_and_offsets() {
        let markdown = "A ![[img.png]] B [[Two.md|2]]";
        let links = parse_wiki_links(markdown);

        assert!(links[0].embed);
        assert_eq!(&markdown[links[0].start_offset..links[0].end_offset], "![[img.png]]");
        assert!(!links[1].embed);
        assert_eq!(&markdown[links[1].start_offset..links[1].end_offset], "[[Two.md|2]]");
    }

    #[test]
    fn ignores_empty_or_malformed_links() {
        let links = parse_wiki_links("[[]] [[|alias]] [[#heading]] [[open");
        assert!(links.is_empty());
    }

    #[test]
    fn multibyte_text_keeps_valid_spans() {
        let markdown = "café [[naïve.md]] ok";
        let links = parse_wiki_links(markdown);
        assert_eq!(&markdown[links[0].target_span.clone()], "naïve.md");
    }
}
