//! # seriatim-integers
//!
//! Arbitrary precision integer arithmetic for the Seriatim polynomial engine.
//!
//! This crate provides:
//! - Signed big integers (`Int`) with inline storage for small values
//! - A fused multiply-accumulate tuned for the series multiplication kernel
//! - Conversions from every machine integer type plus decimal parsing
//!
//! ## Performance Notes
//!
//! - Magnitudes of up to two 64-bit limbs are stored inline, so coefficients
//!   that fit in 128 bits never allocate
//! - `multiply_accumulate` adds limb products straight into the accumulator,
//!   skipping the temporary a full multiply-then-add would create

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod integer;

#[cfg(test)]
mod proptests;

pub use integer::Int;
