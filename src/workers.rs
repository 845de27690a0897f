//! Sizing of the worker pool used by the parallel functions.

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{env, num::NonZeroUsize, thread};

/// The environment variable that overrides the number of worker threads.
pub const WORKERS_ENV: &str = "IMG2PALETTE_WORKERS";

/// Parses a worker count, ignoring zero and malformed values.
fn parse_workers(value: &str) -> Option<usize> {
    value.trim().parse::<NonZeroUsize>().ok().map(NonZeroUsize::get)
}

/// Returns the default number of worker threads:
/// half of the available parallelism, but at least one.
fn default_workers(parallelism: usize) -> usize {
    (parallelism / 2).max(1)
}

/// Returns the number of worker threads to use.
///
/// This is the value of the [`WORKERS_ENV`] environment variable if it holds a positive integer.
/// Otherwise, it is half of the available parallelism, but at least one.
#[must_use]
pub fn worker_count() -> usize {
    if let Some(workers) = env::var(WORKERS_ENV).ok().as_deref().and_then(parse_workers) {
        return workers;
    }

    let parallelism = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    default_workers(parallelism)
}

/// Builds a [`rayon`] thread pool with [`worker_count`] threads.
///
/// Run the `_par` functions inside [`ThreadPool::install`] to bound their parallelism.
///
/// # Errors
/// Returns an error if the thread pool could not be created.
///
/// # Examples
/// ```no_run
/// # use img2palette::{extract_palette_par, worker_pool, Strategy};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = image::open("some image")?.into_rgb8();
/// let palette = worker_pool()?.install(|| extract_palette_par(&img, 8, Strategy::cluster()))?;
/// # Ok(())
/// # }
/// ```
pub fn worker_pool() -> Result<ThreadPool, ThreadPoolBuildError> {
    let workers = worker_count();
    log::debug!("using {workers} worker threads");
    ThreadPoolBuilder::new().num_threads(workers).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_override() {
        assert_eq!(parse_workers("3"), Some(3));
        assert_eq!(parse_workers(" 12\n"), Some(12));
        assert_eq!(parse_workers("0"), None);
        assert_eq!(parse_workers("-2"), None);
        assert_eq!(parse_workers("many"), None);
    }

    #[test]
    fn half_of_the_cpus() {
        assert_eq!(default_workers(1), 1);
        assert_eq!(default_workers(2), 1);
        assert_eq!(default_workers(8), 4);
        assert_eq!(default_workers(13), 6);
    }

    #[test]
    fn at_least_one_worker() {
        assert!(worker_count() >= 1);
    }
}
