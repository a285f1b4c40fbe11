// Workspace root: absolute <-> document path mapping and the fs primitive.

pub mod fs;
pub mod locks;

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use quire_common::path::{self as doc_path, DocumentPath, PathError};

pub use fs::{BoxFuture, LocalFs, WorkspaceFs};
pub use locks::PathLocks;

/// An absolute workspace root. Every other path is expressed relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open an existing directory as a workspace root (canonicalized).
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize workspace root: {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("workspace root is not a directory: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute filesystem location of a document path.
    pub fn absolute(&self, path: &DocumentPath) -> PathBuf {
        path.components().fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Map an absolute path back into the workspace; `None` when outside it.
    pub fn to_document_path(&self, absolute: &Path) -> Option<DocumentPath> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        DocumentPath::new(&parts.join("/")).ok()
    }

    /// Resolve link text written inside `current` to a root-relative path.
    pub fn resolve_relative(
        &self,
        current: &DocumentPath,
        text: &str,
    ) -> Result<DocumentPath, PathError> {
        doc_path::resolve_relative(current, text)
    }

    /// Link text from `current` to `target`.
    pub fn relative_from(&self, current: &DocumentPath, target: &DocumentPath) -> String {
        doc_path::relative_from(current, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    #[test]
    fn absolute_and_back() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::open(tmp.path()).unwrap();

        let absolute = workspace.absolute(&doc("docs/guides/A.md"));
        assert!(absolute.starts_with(workspace.root()));
        assert!(absolute.ends_with("docs/guides/A.md"));
        assert_eq!(workspace.to_document_path(&absolute), Some(doc("docs/guides/A.md")));
    }

    #[test]
    fn paths_outside_root_do_not_map() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::open(tmp.path()).unwrap();

        assert_eq!(workspace.to_document_path(Path::new("/etc/passwd")), None);
        assert_eq!(workspace.to_document_path(workspace.root()), None);
    }

    #[test]
    fn open_rejects_missing_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(Workspace::open(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn link_helpers_delegate_to_resolver() {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::open(tmp.path()).unwrap();
        let current = doc("docs/guides/A.md");

        assert_eq!(workspace.resolve_relative(&current, "../../README.md").unwrap(), doc("README.md"));
        assert_eq!(workspace.relative_from(&current, &doc("README.md")), "../../README.md");
    }
}
