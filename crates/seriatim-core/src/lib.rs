//! # seriatim-core
//!
//! Shared foundations for the Seriatim sparse polynomial engine.
//!
//! This crate provides:
//! - The engine-wide error type (`Error`) and checked casts
//! - Global runtime tunables (block size, estimation threshold, workload split)
//! - Ordered symbol sets (`SymbolSet`) with deterministic merging
//! - The `Coefficient` capability trait implemented for the machine numeric types
//!
//! ## Design Principles
//!
//! - **No panics on user input**: every precondition violation surfaces as `Error`
//! - **Lock-free settings**: tunables are atomics read once per multiplication
//! - **Minimal coefficient contract**: zero, zero test, add, multiply, fused FMA

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cast;
pub mod coefficient;
pub mod error;
pub mod settings;
pub mod symbols;

#[cfg(test)]
mod proptests;

pub use cast::safe_cast;
pub use coefficient::Coefficient;
pub use error::{Error, Result};
pub use symbols::SymbolSet;
