// Workspace-relative document paths and wiki-link resolution.

pub mod normalize;
pub mod resolve;

pub use normalize::{composed, normalize_path, DocumentPath, PathError};
pub use resolve::{relative_from, resolve_relative};
