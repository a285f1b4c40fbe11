// Workspace-wide link maintenance: rewrite on move, validate, find orphans.

pub mod propagate;
pub mod validate;

pub use propagate::{plan_edits, LinkPropagator, MoveOperation, MoveReport};
pub use validate::{
    BrokenImage, BrokenLink, ImageLinkReport, LinkValidator, PageLinkReport, UnusedImage,
};
