//! Reporting: calibration reports, parameter tables and warnings.

pub mod format;

pub use format::*;
