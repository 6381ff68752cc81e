//! Injected data-parallel execution.
//!
//! Master-table maintenance fans work out over disjoint columns. The pool that
//! runs it is passed in by the owner rather than held in a global.

#[cfg(feature = "rayon")]
use crate::error::{Error, Result};
#[cfg(feature = "rayon")]
use alloc::sync::Arc;

/// Fork-join executor over disjoint items.
#[derive(Clone, Debug, Default)]
pub enum Pool {
    /// Run every item on the calling thread.
    #[default]
    Sequential,
    /// Run items on a bounded rayon thread pool.
    #[cfg(feature = "rayon")]
    Rayon(Arc<rayon::ThreadPool>),
}

impl Pool {
    /// Builds a rayon-backed pool with `threads` workers.
    #[cfg(feature = "rayon")]
    pub fn with_threads(threads: usize) -> Result<Pool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map(|pool| Pool::Rayon(Arc::new(pool)))
            .map_err(|e| Error::invalid_operation(alloc::format!("thread pool: {}", e)))
    }

    /// Number of workers items may be spread across.
    pub fn concurrency(&self) -> usize {
        match self {
            Pool::Sequential => 1,
            #[cfg(feature = "rayon")]
            Pool::Rayon(pool) => pool.current_num_threads(),
        }
    }

    /// Runs `f(index, item)` for every item. Items are disjoint, so workers
    /// never share mutable state; the call returns once every item is done.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        match self {
            Pool::Sequential => {
                for (idx, item) in items.iter_mut().enumerate() {
                    f(idx, item);
                }
            }
            #[cfg(feature = "rayon")]
            Pool::Rayon(pool) => {
                use rayon::prelude::*;
                pool.install(|| {
                    items
                        .par_iter_mut()
                        .enumerate()
                        .for_each(|(idx, item)| f(idx, item))
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_sequential_visits_every_item() {
        let mut items = vec![0usize; 5];
        Pool::Sequential.for_each_mut(&mut items, |idx, item| *item = idx * 2);
        assert_eq!(items, vec![0, 2, 4, 6, 8]);
        assert_eq!(Pool::default().concurrency(), 1);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_rayon_visits_every_item() {
        let pool = Pool::with_threads(2).unwrap();
        let mut items = vec![0usize; 64];
        pool.for_each_mut(&mut items, |idx, item| *item = idx + 1);
        assert!(items.iter().enumerate().all(|(i, v)| *v == i + 1));
    }
}
