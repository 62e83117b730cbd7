//! Domain types used by the command-line pipeline.
//!
//! This module defines:
//!
//! - run configuration (`FitConfig`, `SyntheticConfig`, `StressSpec`)
//! - the JSON fit file schema (`FitFile`)

pub mod types;

pub use types::*;
