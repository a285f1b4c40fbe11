// Canonical document paths: `/` separators, traversal rejection, byte-exact names.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),

    #[error("`{0}` resolves outside the workspace root")]
    EscapesWorkspace(String),
}

/// Normalize a workspace-relative path into its canonical form.
///
/// Names are kept exactly as written so they match what is on disk; use
/// [`composed`] when two spellings of the same name must compare equal.
///
/// Rules:
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip leading and trailing `/`
/// - Reject `.` and `..` path components (resolve them first)
/// - Reject null bytes, empty paths and whitespace-only components
/// - Enforce max 512 character limit (after normalization)
pub fn normalize_path(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let unified = input.replace('\\', "/");
    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        if *component == "." || *component == ".." {
            return Err(PathError::Traversal((*component).to_string()));
        }
        if component.trim().is_empty() {
            return Err(PathError::InvalidComponent(
                "(whitespace-only component)".to_string(),
            ));
        }
    }

    let result = components.join("/");

    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

/// NFC form of a file name or path, for matching names that may have been
/// written precomposed in a link but stored decomposed on disk (or the
/// reverse).
pub fn composed(text: &str) -> String {
    text.nfc().collect()
}

/// A workspace-root-relative path to a document, folder or asset.
///
/// Always `/`-separated and free of `.`/`..` components, so two values compare
/// equal exactly when they name the same workspace entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn new(input: &str) -> Result<Self, PathError> {
        normalize_path(input).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Components of the containing directory (empty for root-level entries).
    pub fn parent_components(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self.components().collect();
        parts.pop();
        parts
    }

    /// The containing directory, or `None` for root-level entries.
    pub fn parent(&self) -> Option<DocumentPath> {
        self.0.rsplit_once('/').map(|(dir, _)| Self(dir.to_string()))
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lowercased extension of the final component, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_markdown(&self) -> bool {
        self.extension().as_deref() == Some("md")
    }

    /// The same path with `.md` appended (`notes/todo` → `notes/todo.md`).
    pub fn with_markdown_extension(&self) -> DocumentPath {
        Self(format!("{}.md", self.0))
    }

    /// True when `self` is `folder` itself or lies anywhere beneath it.
    pub fn is_within(&self, folder: &DocumentPath) -> bool {
        self.0 == folder.0
            || (self.0.len() > folder.0.len()
                && self.0.starts_with(&folder.0)
                && self.0.as_bytes()[folder.0.len()] == b'/')
    }

    /// Swap the `from` prefix for `to`; `None` when `self` is not within `from`.
    pub fn rebase(&self, from: &DocumentPath, to: &DocumentPath) -> Option<DocumentPath> {
        if !self.is_within(from) {
            return None;
        }
        let suffix = &self.0[from.0.len()..];
        Some(Self(format!("{}{}", to.0, suffix)))
    }

    pub fn join(&self, relative: &str) -> Result<DocumentPath, PathError> {
        Self::new(&format!("{}/{}", self.0, relative))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl TryFrom<&str> for DocumentPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.0
    }
}
