// quire-engine: link maintenance and git sync for a markdown workspace.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod git;
pub mod links;
pub mod runtime;
pub mod session;
pub mod sync;
pub mod watcher;
pub mod workspace;

pub use engine::WorkspaceEngine;
pub use error::{EngineError, EngineResult};
