// Per-path async locks so no two writers interleave on the same file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use quire_common::path::DocumentPath;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PathLocks {
    locks: StdMutex<HashMap<DocumentPath, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`; released when the guard drops.
    pub async fn lock(&self, path: &DocumentPath) -> OwnedMutexGuard<()> {
        let lock = {
            let mut guard = self.locks.lock().expect("path lock table poisoned");
            guard.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(guard.entry(path.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Paths currently held or awaited.
    pub fn active(&self) -> usize {
        let guard = self.locks.lock().expect("path lock table poisoned");
        guard.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doc(path: &str) -> DocumentPath {
        DocumentPath::new(path).unwrap()
    }

    #[tokio::test]
    async fn same_path_is_exclusive() {
        let locks = Arc::new(PathLocks::new());
        let first = locks.lock(&doc("a.md")).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(&doc("a.md")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_paths_do_not_block() {
        let locks = PathLocks::new();
        let _a = locks.lock(&doc("a.md")).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&doc("b.md")))
            .await
            .expect("unrelated path should not block");
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = PathLocks::new();
        drop(locks.lock(&doc("a.md")).await);
        let _b = locks.lock(&doc("b.md")).await;
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
