//! The global worker pool.
//!
//! Workers are long-lived threads, each draining its own unbounded queue.
//! Tasks are addressed to a worker by index, which lets the multiplication
//! engine give every thread a disjoint slice of work and keep queue
//! contention at zero. Panics inside a task are caught on the worker and
//! surface as [`Error::TaskFailure`] through the task's future.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use seriatim_core::{Error, Result};
use tracing::debug;

use crate::future::{pair, TaskFuture};

type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static IS_POOL_WORKER: Cell<bool> = const { Cell::new(false) };
}

struct Worker {
    sender: Sender<Task>,
    handle: JoinHandle<()>,
}

struct Pool {
    workers: Vec<Worker>,
    pinning: bool,
}

static POOL: OnceLock<Mutex<Pool>> = OnceLock::new();

fn pool() -> &'static Mutex<Pool> {
    POOL.get_or_init(|| {
        let size = default_size();
        Mutex::new(Pool::build(size, false))
    })
}

fn default_size() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn spawn_worker(index: usize, pinning: bool) -> std::io::Result<Worker> {
    let (sender, receiver) = unbounded::<Task>();
    let handle = std::thread::Builder::new()
        .name(format!("seriatim-worker-{index}"))
        .spawn(move || {
            IS_POOL_WORKER.with(|flag| flag.set(true));
            if pinning {
                if let Some(cores) = core_affinity::get_core_ids() {
                    if !cores.is_empty() {
                        core_affinity::set_for_current(cores[index % cores.len()]);
                    }
                }
            }
            while let Ok(task) = receiver.recv() {
                task();
            }
        })?;
    Ok(Worker { sender, handle })
}

impl Pool {
    fn build(size: usize, pinning: bool) -> Pool {
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            match spawn_worker(index, pinning) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    debug!(index, error = %e, "failed to spawn worker");
                    break;
                }
            }
        }
        Pool { workers, pinning }
    }

    fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            drop(worker.sender);
            let _ = worker.handle.join();
        }
    }

    fn rebuild(&mut self, size: usize, pinning: bool) {
        self.shutdown();
        *self = Pool::build(size, pinning);
    }
}

/// Submits `task` to the queue of worker `worker_index`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the index is out of range, or
/// [`Error::TaskFailure`] if the worker's queue has shut down.
pub fn enqueue<F, R>(worker_index: usize, task: F) -> Result<TaskFuture<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let pool = pool().lock();
    let Some(worker) = pool.workers.get(worker_index) else {
        return Err(Error::invalid_argument(format!(
            "no worker with index {worker_index} (pool size {})",
            pool.workers.len()
        )));
    };
    let (future, promise) = pair();
    let boxed: Task = Box::new(move || {
        let outcome = catch_unwind(AssertUnwindSafe(task));
        promise.fulfill(match outcome {
            Ok(value) => Ok(value),
            Err(payload) => Err(Error::TaskFailure(panic_message(payload.as_ref()))),
        });
    });
    if worker.sender.send(boxed).is_err() {
        return Err(Error::TaskFailure(format!(
            "worker {worker_index} queue closed"
        )));
    }
    Ok(future)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Number of workers currently in the pool.
pub fn size() -> usize {
    pool().lock().workers.len()
}

/// Resizes the pool, waiting for queued tasks on retiring workers to finish.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `size` is zero.
pub fn resize(size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::invalid_argument("pool size must be nonzero"));
    }
    let mut pool = pool().lock();
    if pool.workers.len() == size {
        return Ok(());
    }
    let pinning = pool.pinning;
    pool.rebuild(size, pinning);
    debug!(size, "resized worker pool");
    Ok(())
}

/// Enables or disables pinning of workers to fixed cores.
///
/// Rebuilding the pool waits for in-flight tasks, so the call is safe at
/// any quiescent point. Workers are assigned round-robin over the cores
/// reported by the operating system.
pub fn set_pinning(pinning: bool) {
    let mut pool = pool().lock();
    if pool.pinning == pinning {
        return;
    }
    let size = pool.workers.len();
    pool.rebuild(size, pinning);
    debug!(pinning, "rebuilt worker pool");
}

/// Returns whether workers are currently pinned to cores.
pub fn pinning() -> bool {
    pool().lock().pinning
}

/// Picks a thread count for a workload of `work` elementary operations,
/// granting one thread per `min_work` operations, clamped to the pool size.
///
/// Called from inside a pool worker this always returns 1, so nested
/// parallelism cannot deadlock the fixed-size pool.
pub fn use_threads(work: u128, min_work: u128) -> usize {
    if IS_POOL_WORKER.with(Cell::get) {
        return 1;
    }
    let per_thread = min_work.max(1);
    let capacity = size() as u128;
    if capacity == 0 {
        return 1;
    }
    let wanted = (work / per_thread).clamp(1, capacity);
    usize::try_from(wanted).unwrap_or(1)
}
