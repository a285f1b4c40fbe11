// Domain events for path relocation and removal, delivered in-process to
// registered handlers (open tabs, caches).

use std::sync::{Arc, RwLock};

use quire_common::path::DocumentPath;
use tracing::debug;

use crate::workspace::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    PathRenamed { old: DocumentPath, new: DocumentPath, is_folder: bool },
    PathDeleted { path: DocumentPath, is_folder: bool },
}

pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, event: &'a WorkspaceEvent) -> BoxFuture<'a, ()>;
}

/// Explicit dispatcher passed to the components that publish.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().expect("event bus lock poisoned").push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().expect("event bus lock poisoned").len()
    }

    /// Deliver `event` to every handler in subscription order, awaiting each.
    pub async fn publish(&self, event: WorkspaceEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> =
            self.handlers.read().expect("event bus lock poisoned").clone();
        for handler in handlers {
            debug!(handler = handler.name(), event = ?event, "dispatching workspace event");
            handler.handle(&event).await;
        }
    }
}
