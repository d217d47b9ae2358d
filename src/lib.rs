//! Workspace-level test and benchmark host.
//!
//! Integration tests live in `tests/` and cross-crate benchmarks in
//! `benches/`. The library target itself is intentionally empty.
