//! Input/output helpers.
//!
//! - CSV ingest of timestamped series (`ingest`)
//! - fit JSON and series CSV exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
