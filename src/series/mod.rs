//! Time series primitives: aligned series, grids and the observed record.

pub mod grid;
pub mod observed;
pub mod timeseries;

pub use grid::*;
pub use observed::*;
pub use timeseries::*;
