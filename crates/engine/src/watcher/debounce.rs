// Coalesces bursts of watcher events per document.
//
// Editors often save through a temp file and rename, which shows up as a
// remove followed by a create on the same path. Within one window:
// - create + modify stays a create,
// - remove + create becomes a modify,
// - create + remove cancels out entirely,
// - anything else keeps the latest kind.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use quire_common::path::DocumentPath;

use super::FsEventKind;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Pending {
    kind: Option<FsEventKind>,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<DocumentPath, Pending>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: HashMap::new() }
    }

    pub fn push(&mut self, path: DocumentPath, kind: FsEventKind) {
        self.push_at(path, kind, Instant::now());
    }

    fn push_at(&mut self, path: DocumentPath, kind: FsEventKind, now: Instant) {
        let entry = self.pending.entry(path).or_insert(Pending { kind: None, last_seen: now });
        entry.kind = merge(entry.kind, kind);
        entry.last_seen = now;
    }

    /// Events whose window has elapsed, in path order.
    pub fn drain_ready(&mut self) -> Vec<(DocumentPath, FsEventKind)> {
        self.drain_ready_at(Instant::now())
    }

    fn drain_ready_at(&mut self, now: Instant) -> Vec<(DocumentPath, FsEventKind)> {
        let window = self.window;
        let mut ready = Vec::new();
        self.pending.retain(|path, pending| {
            if now.duration_since(pending.last_seen) < window {
                return true;
            }
            if let Some(kind) = pending.kind {
                ready.push((path.clone(), kind));
            }
            false
        });
        ready.sort_by(|a, b| a.0.cmp(&b.0));
        ready
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// When the earliest pending event becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.last_seen + self.window).min()
    }
}

fn merge(previous: Option<FsEventKind>, next: FsEventKind) -> Option<FsEventKind> {
    use FsEventKind::{Create, Modify, Remove};
    match (previous, next) {
        (Some(Create), Modify) => Some(Create),
        (Some(Create), Remove) => None,
        (Some(Remove), Create) => Some(Modify),
        (_, kind) => Some(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    #[test]
    fn waits_for_quiet_window() {
        let mut debouncer = Debouncer::default();
        let now = Instant::now();

        debouncer.push_at(doc("a.md"), FsEventKind::Modify, now);
        debouncer.push_at(doc("a.md"), FsEventKind::Modify, now + Duration::from_millis(80));

        assert!(debouncer.drain_ready_at(now + Duration::from_millis(100)).is_empty());
        assert_eq!(
            debouncer.drain_ready_at(now + Duration::from_millis(180)),
            vec![(doc("a.md"), FsEventKind::Modify)]
        );
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn atomic_save_becomes_modify() {
        let mut debouncer = Debouncer::default();
        let now = Instant::now();

        debouncer.push_at(doc("a.md"), FsEventKind::Remove, now);
        debouncer.push_at(doc("a.md"), FsEventKind::Create, now + Duration::from_millis(5));

        let ready = debouncer.drain_ready_at(now + Duration::from_millis(200));
        assert_eq!(ready, vec![(doc("a.md"), FsEventKind::Modify)]);
    }

    #[test]
    fn transient_file_is_dropped() {
        let mut debouncer = Debouncer::default();
        let now = Instant::now();

        debouncer.push_at(doc("tmp.md"), FsEventKind::Create, now);
        debouncer.push_at(doc("tmp.md"), FsEventKind::Modify, now);
        debouncer.push_at(doc("tmp.md"), FsEventKind::Remove, now);

        assert!(debouncer.drain_ready_at(now + Duration::from_secs(1)).is_empty());
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn paths_are_independent_and_deadline_is_earliest() {
        let mut debouncer = Debouncer::default();
        let now = Instant::now();

        debouncer.push_at(doc("b.md"), FsEventKind::Create, now + Duration::from_millis(50));
        debouncer.push_at(doc("a.md"), FsEventKind::Modify, now);

        assert_eq!(debouncer.next_deadline(), Some(now + DEFAULT_DEBOUNCE));
        assert_eq!(
            debouncer.drain_ready_at(now + Duration::from_millis(100)),
            vec![(doc("a.md"), FsEventKind::Modify)]
        );
        assert_eq!(
            debouncer.drain_ready_at(now + Duration::from_millis(150)),
            vec![(doc("b.md"), FsEventKind::Create)]
        );
        assert!(debouncer.next_deadline().is_none());
    }
}
