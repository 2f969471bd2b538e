//! Cooperative chunked processing.
//!
//! Item-wise work is split into slices bounded by an item count and a
//! wall-clock budget. Between slices the task yields to the scheduler so a
//! single-threaded runtime keeps servicing timers, I/O and other tasks.

use tokio::time::Instant;

use super::config::ChunkConfig;

/// Progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Items processed so far
    pub processed: usize,
    /// Total number of items
    pub total: usize,
}

impl ChunkProgress {
    /// Completion percentage (100 for an empty input).
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.processed * 100 / self.total
        }
    }
}

/// Output of a chunked run.
#[derive(Debug)]
pub struct ChunkedRun<R> {
    /// One result per input item, in input order
    pub results: Vec<R>,
    /// Number of slices the work was split into
    pub slices: usize,
}

/// Process `items` in cooperative slices.
///
/// `processor` runs exactly once per item, in order. `on_progress` fires every
/// `progress_every` items and once more for the final item.
pub async fn process_chunked<T, R, F, P>(
    items: &[T],
    config: &ChunkConfig,
    mut processor: F,
    mut on_progress: P,
) -> ChunkedRun<R>
where
    F: FnMut(usize, &T) -> R,
    P: FnMut(ChunkProgress),
{
    let total = items.len();
    let max_items = config.max_items_per_slice.max(1);
    let budget = config.slice_budget();
    let every = config.progress_every.max(1);

    let mut results = Vec::with_capacity(total);
    let mut slices = usize::from(total > 0);
    let mut slice_start = Instant::now();
    let mut in_slice = 0;

    for (index, item) in items.iter().enumerate() {
        results.push(processor(index, item));
        in_slice += 1;

        let processed = index + 1;
        if processed % every == 0 || processed == total {
            on_progress(ChunkProgress { processed, total });
        }

        let slice_full = in_slice >= max_items || slice_start.elapsed() >= budget;
        if slice_full && processed < total {
            tokio::task::yield_now().await;
            slices += 1;
            slice_start = Instant::now();
            in_slice = 0;
        }
    }

    tracing::debug!(items = total, slices, "chunked processing finished");
    ChunkedRun { results, slices }
}

/// Chunked for-each that hands all results to `on_complete`.
pub async fn for_each_chunked<T, R, O, F, C>(
    items: &[T],
    config: &ChunkConfig,
    processor: F,
    on_complete: C,
) -> O
where
    F: FnMut(usize, &T) -> R,
    C: FnOnce(Vec<R>) -> O,
{
    let run = process_chunked(items, config, processor, |_| {}).await;
    on_complete(run.results)
}
