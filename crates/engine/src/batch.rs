// Bounded fan-out over workspace documents.
//
// Documents are processed in fixed-size groups; each group runs concurrently
// and the next group starts only after the current one completes. A failure
// on one document is logged and counted without aborting its siblings.

use std::future::Future;

use futures_util::future::join_all;
use quire_common::path::DocumentPath;
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 8;
pub const MIN_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 10;

/// Clamp a configured batch size into `MIN_BATCH_SIZE..=MAX_BATCH_SIZE`.
pub fn clamp_batch_size(size: usize) -> usize {
    size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// A document that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: DocumentPath,
    pub error: String,
}

/// Per-document results plus the failures encountered along the way.
///
/// `items` is empty, never absent, when nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport<T> {
    pub items: Vec<T>,
    pub failures: Vec<FileFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { items: Vec::new(), failures: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn is_clean(&self) -> bool {
        self.items.is_empty() && self.failures.is_empty()
    }
}

/// Run `op` over `paths` in groups of `batch_size`.
///
/// `Ok(Some(item))` is collected, `Ok(None)` means nothing to report for that
/// document, and `Err` is recorded as a [`FileFailure`].
pub async fn for_each_document<T, F, Fut>(
    paths: Vec<DocumentPath>,
    batch_size: usize,
    op: F,
) -> BatchReport<T>
where
    F: Fn(DocumentPath) -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    let mut report = BatchReport::default();

    for chunk in paths.chunks(clamp_batch_size(batch_size)) {
        let results = join_all(chunk.iter().map(|path| {
            let pending = op(path.clone());
            async move { (path, pending.await) }
        }))
        .await;

        for (path, result) in results {
            match result {
                Ok(Some(item)) => report.items.push(item),
                Ok(None) => {}
                Err(error) => {
                    warn!(path = %path, error = %format!("{error:#}"), "document skipped after failure");
                    report
                        .failures
                        .push(FileFailure { path: path.clone(), error: format!("{error:#}") });
                }
            }
        }
    }

    report
}
