//! # Seriatim
//!
//! A sparse polynomial-series multiplication engine.
//!
//! Seriatim multiplies large sparse series in many variables, packing
//! exponent vectors into single machine words where they fit and spreading
//! the work of one product across a pool of long-lived worker threads.
//!
//! ## Features
//!
//! - **Kronecker packing**: exponent vectors folded into one signed word
//! - **Generic coefficients**: machine integers, floats, or the bundled
//!   arbitrary-precision `Int`
//! - **Parallel products**: the output table is split into bucket zones
//!   that workers fill without locking on the insertion path
//! - **Degree truncation**: a process-wide policy drops high-degree
//!   product terms while the product is formed, not after
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seriatim::prelude::*;
//!
//! let symbols = SymbolSet::from_names(["x", "y"]);
//! let mut lhs: Series<i64> = Series::new(KeyKind::Packed, symbols)?;
//! lhs.insert(&[1, 0], 1)?;
//! lhs.insert(&[0, 1], 1)?;
//! let square = lhs.multiply_untruncated(&lhs)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use seriatim_core as core;
pub use seriatim_integers as integers;
pub use seriatim_poly as poly;
pub use seriatim_pool as pool;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use seriatim_core::{Coefficient, Error, Result, SymbolSet};
    pub use seriatim_integers::Int;
    pub use seriatim_poly::{
        KeyKind, Monomial, Series, Term, TermTable, TruncationPolicy,
    };
}
