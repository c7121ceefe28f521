//! Bounded-concurrency mapping.
//!
//! Document-level file work (sample extraction, write-back) runs through
//! [`bounded_map`] to cap the number of files open at once. Results come back
//! in input order; execution order between items is unspecified.

use rayon::prelude::*;

/// Map `f` over `items` with at most `max_concurrent` items in flight.
///
/// Falls back to sequential processing for trivial inputs or when a local
/// thread pool cannot be built.
pub fn bounded_map<T, R, F>(items: Vec<T>, max_concurrent: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    if items.len() <= 1 || max_concurrent <= 1 {
        return items.into_iter().map(f).collect();
    }

    let threads = max_concurrent.min(items.len());
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
        Err(e) => {
            log::warn!("failed to build thread pool ({e}), processing sequentially");
            items.into_iter().map(f).collect()
        }
    }
}
