//! Sprig benchmarking suite
//!
//! Criterion benchmarks for version ordering, dependency selection,
//! aggregate fan-out and graph walking, plus the fixtures they share.

pub mod common;

pub use common::*;
