//! Global runtime tunables.
//!
//! The multiplication engine consults these knobs at the start of each run;
//! changing one therefore affects subsequent multiplications, never one in
//! flight. All getters and setters are lock-free.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::debug;

use crate::error::{Error, Result};

static MULTIPLICATION_BLOCK_SIZE: AtomicUsize = AtomicUsize::new(256);
static ESTIMATE_THRESHOLD: AtomicUsize = AtomicUsize::new(200);
static MIN_WORK_PER_THREAD: AtomicU64 = AtomicU64::new(250_000);

/// Returns the block size used to tile the term-by-term multiplication
/// loops for cache locality.
pub fn multiplication_block_size() -> usize {
    MULTIPLICATION_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the multiplication block size.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `size` is zero.
pub fn set_multiplication_block_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::invalid_argument("block size must be nonzero"));
    }
    MULTIPLICATION_BLOCK_SIZE.store(size, Ordering::Relaxed);
    debug!(size, "multiplication block size changed");
    Ok(())
}

/// Returns the operand-size threshold below which the output-size
/// estimation step is skipped.
pub fn estimate_threshold() -> usize {
    ESTIMATE_THRESHOLD.load(Ordering::Relaxed)
}

/// Sets the estimation threshold.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `threshold` is zero.
pub fn set_estimate_threshold(threshold: usize) -> Result<()> {
    if threshold == 0 {
        return Err(Error::invalid_argument("estimate threshold must be nonzero"));
    }
    ESTIMATE_THRESHOLD.store(threshold, Ordering::Relaxed);
    debug!(threshold, "estimate threshold changed");
    Ok(())
}

/// Returns the minimum number of term-by-term products each worker thread
/// should be given before another thread is recruited.
pub fn min_work_per_thread() -> u64 {
    MIN_WORK_PER_THREAD.load(Ordering::Relaxed)
}

/// Sets the minimum per-thread workload.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `work` is zero.
pub fn set_min_work_per_thread(work: u64) -> Result<()> {
    if work == 0 {
        return Err(Error::invalid_argument("min work per thread must be nonzero"));
    }
    MIN_WORK_PER_THREAD.store(work, Ordering::Relaxed);
    debug!(work, "min work per thread changed");
    Ok(())
}
