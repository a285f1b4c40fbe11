// Code blocks and inline code spans. Text inside them is never a link.

use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag};

/// Byte ranges of every code block (fenced or indented) and inline code span,
/// in document order. An unclosed fence runs to the end of the document.
pub fn code_ranges(content: &str) -> Vec<Range<usize>> {
    Parser::new_ext(content, Options::empty())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
        .collect()
}
