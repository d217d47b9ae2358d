//! Futures for tasks submitted to the worker pool.
//!
//! A [`TaskFuture`] is the caller's handle to one enqueued task. The worker
//! fulfills the paired promise exactly once, with either the task's return
//! value or the panic it was caught with. [`FutureList`] collects a batch of
//! futures so a parallel phase can be drained completely before the first
//! failure is reported.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use seriatim_core::{Error, Result};

enum State<R> {
    Pending,
    Ready(Result<R>),
    Taken,
}

struct Shared<R> {
    state: Mutex<State<R>>,
    cond: Condvar,
}

/// Handle to the result of one pool task.
pub struct TaskFuture<R> {
    shared: Arc<Shared<R>>,
}

/// Worker-side handle that fulfills the paired [`TaskFuture`].
pub(crate) struct TaskPromise<R> {
    shared: Option<Arc<Shared<R>>>,
}

/// Creates a connected future/promise pair.
pub(crate) fn pair<R>() -> (TaskFuture<R>, TaskPromise<R>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        cond: Condvar::new(),
    });
    (
        TaskFuture {
            shared: Arc::clone(&shared),
        },
        TaskPromise {
            shared: Some(shared),
        },
    )
}

impl<R> TaskFuture<R> {
    /// Blocks until the task has finished, without consuming the result.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending) {
            self.shared.cond.wait(&mut state);
        }
    }

    /// Blocks until the task has finished and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskFailure`] if the task panicked or was dropped
    /// before running.
    pub fn get(self) -> Result<R> {
        self.wait();
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => result,
            // Unreachable after wait(): get() consumes the only caller handle.
            State::Pending | State::Taken => {
                Err(Error::TaskFailure("future already consumed".to_string()))
            }
        }
    }
}

impl<R> TaskPromise<R> {
    /// Stores the task outcome and wakes every waiter.
    pub(crate) fn fulfill(mut self, result: Result<R>) {
        if let Some(shared) = self.shared.take() {
            let mut state = shared.state.lock();
            *state = State::Ready(result);
            shared.cond.notify_all();
        }
    }
}

impl<R> Drop for TaskPromise<R> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut state = shared.state.lock();
            if matches!(*state, State::Pending) {
                *state = State::Ready(Err(Error::TaskFailure(
                    "task dropped without running".to_string(),
                )));
                shared.cond.notify_all();
            }
        }
    }
}

/// A batch of futures drained as a unit.
///
/// `get_all` waits for every future before reporting the first error, so a
/// failed parallel phase never leaves sibling tasks running against freed
/// state.
#[derive(Default)]
pub struct FutureList<R> {
    futures: Vec<TaskFuture<R>>,
}

impl<R> FutureList<R> {
    /// Creates an empty list.
    pub fn new() -> Self {
        FutureList {
            futures: Vec::new(),
        }
    }

    /// Number of futures collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.futures.len()
    }

    /// Returns `true` if no futures have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    /// Adds a future to the batch.
    pub fn push(&mut self, future: TaskFuture<R>) {
        self.futures.push(future);
    }

    /// Blocks until every future in the batch has completed.
    pub fn wait_all(&self) {
        for future in &self.futures {
            future.wait();
        }
    }

    /// Waits for every future, then returns the first error encountered in
    /// submission order, if any.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Error`] stored in the batch.
    pub fn get_all(self) -> Result<()> {
        self.wait_all();
        let mut first = None;
        for future in self.futures {
            if let Err(e) = future.get() {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
