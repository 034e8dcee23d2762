// src/engine/pool.rs
//
// Global thread pool for pixel-parallel work (rotate resampling, cutout classification).
//
// **Architecture Decision**: a single lazily-built pool shared by every run instead of
// a pool per request. Cutout splits work by row; rotation runs imageproc's warp in the pool.
//
// **IMPORTANT**:
// - Pool is initialized lazily on first use
// - The thread count seen on first use wins; later changes have NO effect

use crate::config::{ManipulatorConfig, DEFAULT_PARALLEL_THRESHOLD};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::warn;

/// Minimum number of rayon threads to ensure at least some parallelism
const MIN_RAYON_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// When and where per-pixel work is spread across threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parallelism {
    /// Minimum pixel count before work leaves the calling thread
    pub threshold: u64,
    /// Pool size requested on first use (None = available parallelism)
    pub threads: Option<usize>,
}

impl Default for Parallelism {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PARALLEL_THRESHOLD,
            threads: None,
        }
    }
}

impl Parallelism {
    /// Never leave the calling thread.
    pub fn sequential() -> Self {
        Self {
            threshold: u64::MAX,
            threads: None,
        }
    }
}

impl From<&ManipulatorConfig> for Parallelism {
    fn from(config: &ManipulatorConfig) -> Self {
        Self {
            threshold: config.parallel_threshold,
            threads: config.threads,
        }
    }
}

/// Returns the shared pool, or None if it could not be built (work then stays sequential).
pub fn get_pool(threads: Option<usize>) -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = threads
                .unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .map(|n| n.get())
                        .unwrap_or(MIN_RAYON_THREADS)
                })
                .max(MIN_RAYON_THREADS);

            match rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("image-manipulator-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(target: "image_manipulator::pool", error = %e, num_threads, "failed to build thread pool; running sequentially");
                    None
                }
            }
        })
        .as_ref()
}

/// Run `f` inside the shared pool once `pixel_count` reaches the threshold,
/// so crate-internal rayon work (imageproc warps) uses the configured pool.
pub(crate) fn install<R, F>(pixel_count: u64, parallelism: &Parallelism, f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if pixel_count >= parallelism.threshold {
        if let Some(pool) = get_pool(parallelism.threads) {
            return pool.install(f);
        }
    }
    f()
}

/// Run `f(row_index, row_bytes)` over every row of `data`.
///
/// Rows are processed on the shared pool when `pixel_count` reaches the threshold.
pub(crate) fn for_each_row<F>(
    data: &mut [u8],
    stride: usize,
    pixel_count: u64,
    parallelism: &Parallelism,
    f: F,
) where
    F: Fn(usize, &mut [u8]) + Sync + Send,
{
    if stride == 0 || data.is_empty() {
        return;
    }

    if pixel_count >= parallelism.threshold {
        if let Some(pool) = get_pool(parallelism.threads) {
            pool.install(|| {
                data.par_chunks_mut(stride)
                    .enumerate()
                    .for_each(|(y, row)| f(y, row));
            });
            return;
        }
    }

    data.chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| f(y, row));
}
