//! # seriatim-pool
//!
//! Worker-thread pool for the Seriatim polynomial engine.
//!
//! This crate provides:
//! - A global pool of long-lived workers, one unbounded queue per worker
//! - Index-addressed task submission, so callers control work placement
//! - Futures that re-raise task panics as errors after the batch drains
//! - Optional pinning of workers to fixed cores
//!
//! ## Design Principles
//!
//! - **No shared queue**: a task goes to exactly the worker it names,
//!   keeping the multiplication engine's work placement deterministic
//! - **No lost tasks**: a failed batch is fully drained before the first
//!   error is reported
//! - **No nested parallelism**: workload sizing returns a single thread
//!   when already running on a pool worker

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod future;
pub mod pool;

pub use future::{FutureList, TaskFuture};
pub use pool::{enqueue, pinning, resize, set_pinning, size, use_threads};
