//! Fixed-size worker pool with an ordered gather.
//!
//! A trial scatters one read-only context to every worker, maps each grid
//! point to an outcome and gathers the outcomes by point position. Completion
//! order never leaks into the result.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::AppError;

pub struct WorkerPool {
    pool: ThreadPool,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, AppError> {
        if size == 0 {
            return Err(AppError::new(2, "Worker pool size must be >= 1."));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("lbs-worker-{i}"))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to start worker pool: {e}")))?;
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Apply `task` to every item on the pool; `out[i]` belongs to `items[i]`.
    ///
    /// Blocks until every item has been processed.
    pub fn map_ordered<C, T, R, F>(&self, ctx: &C, items: &[T], task: F) -> Vec<R>
    where
        C: Sync + ?Sized,
        T: Sync,
        R: Send,
        F: Fn(&C, usize, &T) -> R + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(idx, item)| task(ctx, idx, item))
                .collect()
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}
