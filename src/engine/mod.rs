//! Model composition and evaluation.
//!
//! - `registry`: ordered, uniquely named components
//! - `params`: immutable parameter table snapshots with a frozen slot map
//! - `window`: calibration window resolution
//! - `model`: simulation, residuals, calibration and named accessors

pub mod model;
pub mod params;
pub mod registry;
pub mod window;

pub use model::*;
pub use params::*;
pub use registry::*;
pub use window::*;
