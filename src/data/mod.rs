//! Data sources beyond CSV files.
//!
//! - `synthetic`: seeded stress + observation generation for demos and tests

pub mod synthetic;

pub use synthetic::*;
