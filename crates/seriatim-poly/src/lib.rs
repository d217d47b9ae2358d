//! # seriatim-poly
//!
//! Sparse polynomial series over generic coefficients.
//!
//! This crate provides:
//! - Kronecker packing of exponent vectors into single signed words
//! - An open-addressing term table with backward-shift deletion
//! - A multiplication engine with randomised output-size estimation and a
//!   zone-split parallel kernel for packed keys
//! - A process-wide degree truncation policy applied during products
//!
//! ## Performance Notes
//!
//! Packed keys hash to their own code, so the bucket of a product term is
//! the sum of its factors' buckets modulo the table size. The engine
//! leans on that identity to sort operands by bucket, schedule work in
//! bucket order, and hand disjoint slices of the output table to pool
//! workers without locking on the insertion path.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod kronecker;
pub mod monomial;
mod multiplier;
pub mod series;
pub mod table;
pub mod truncation;

#[cfg(test)]
mod proptests;

pub use monomial::{ExponentVec, KeyKind, Monomial, Term};
pub use series::Series;
pub use table::TermTable;
pub use truncation::{
    disable_truncation, generation, policy, set_policy, truncate_degree, truncate_partial_degree,
    TruncationPolicy,
};
