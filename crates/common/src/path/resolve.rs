// Wiki-link text <-> canonical path conversion.
//
// Link text is always written relative to the directory of the document that
// contains it. A leading `/` anchors the text at the workspace root instead.

use super::normalize::{DocumentPath, PathError};

/// Resolve link text written inside `current` into a canonical workspace path.
///
/// `..` segments that would climb above the workspace root fail with
/// [`PathError::EscapesWorkspace`]; callers treat that as an unresolved link.
pub fn resolve_relative(
    current: &DocumentPath,
    relative_text: &str,
) -> Result<DocumentPath, PathError> {
    let unified = relative_text.trim().replace('\\', "/");
    if unified.is_empty() {
        return Err(PathError::Empty);
    }

    let mut stack: Vec<&str> =
        if unified.starts_with('/') { Vec::new() } else { current.parent_components() };

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(PathError::EscapesWorkspace(relative_text.to_string()));
                }
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        return Err(PathError::Empty);
    }

    DocumentPath::new(&stack.join("/"))
}

/// Shortest link text that, written inside `current`, resolves to `target`.
///
/// A target in the same directory yields its bare name; a target that is the
/// current directory itself yields `.`.
pub fn relative_from(current: &DocumentPath, target: &DocumentPath) -> String {
    let from = current.parent_components();
    let to: Vec<&str> = target.components().collect();

    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<&str> = std::iter::repeat("..").take(from.len() - common).collect();
    parts.extend_from_slice(&to[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    #[test]
    fn resolves_sibling_and_parent_links() {
        let current = doc("docs/A.md");
        assert_eq!(resolve_relative(&current, "B.md").unwrap(), doc("docs/B.md"));
        assert_eq!(resolve_relative(&current, "../README.md").unwrap(), doc("README.md"));
        assert_eq!(resolve_relative(&current, "./guides/C.md").unwrap(), doc("docs/guides/C.md"));
    }

    #[test]
    fn leading_slash_is_root_relative() {
        let current = doc("docs/deep/A.md");
        assert_eq!(resolve_relative(&current, "/notes/B.md").unwrap(), doc("notes/B.md"));
    }

    #[test]
    fn backslashes_and_whitespace_are_tolerated() {
        let current = doc("docs/A.md");
        assert_eq!(resolve_relative(&current, " ..\\img\\x.png ").unwrap(), doc("img/x.png"));
    }

    #[test]
    fn escaping_the_root_is_an_error() {
        let current = doc("docs/A.md");
        assert_eq!(
            resolve_relative(&current, "../../outside.md"),
            Err(PathError::EscapesWorkspace("../../outside.md".to_string()))
        );
        assert_eq!(
            resolve_relative(&doc("README.md"), "../x.md"),
            Err(PathError::EscapesWorkspace("../x.md".to_string()))
        );
    }

    #[test]
    fn resolving_to_the_root_itself_is_empty() {
        assert_eq!(resolve_relative(&doc("docs/A.md"), ".."), Err(PathError::Empty));
        assert_eq!(resolve_relative(&doc("docs/A.md"), "  "), Err(PathError::Empty));
    }

    #[test]
    fn relative_from_examples() {
        assert_eq!(relative_from(&doc("docs/guides/A.md"), &doc("README.md")), "../../README.md");
        assert_eq!(relative_from(&doc("docs/B.md"), &doc("docs/guides/A.md")), "guides/A.md");
        assert_eq!(relative_from(&doc("docs/B.md"), &doc("docs/A.md")), "A.md");
        assert_eq!(relative_from(&doc("docs/B.md"), &doc("docs")), ".");
        assert_eq!(relative_from(&doc("docs/sub/B.md"), &doc("docs")), "..");
        assert_eq!(relative_from(&doc("README.md"), &doc("docs/A.md")), "docs/A.md");
    }

    #[test]
    fn relative_from_shares_only_whole_components() {
        assert_eq!(relative_from(&doc("doc/A.md"), &doc("docs/B.md")), "../docs/B.md");
    }

    fn path_strategy() -> impl Strategy<Value = DocumentPath> {
        prop::collection::vec("[a-c]{1,3}", 1..5)
            .prop_map(|parts| DocumentPath::new(&parts.join("/")).unwrap())
    }

    proptest! {
        #[test]
        fn relative_text_round_trips(current in path_strategy(), target in path_strategy()) {
            let text = relative_from(&current, &target);
            prop_assert_eq!(resolve_relative(&current, &text).unwrap(), target);
        }

        #[test]
        fn relative_text_never_uses_backslashes(current in path_strategy(), target in path_strategy()) {
            let text = relative_from(&current, &target);
            prop_assert!(!text.contains('\\'));
            prop_assert!(!text.starts_with('/'));
        }
    }
}
