//! Response components and noise models.
//!
//! The engine only depends on the two traits (`TimeSeriesComponent`,
//! `NoiseModel`); the concrete implementations here make it usable end-to-end.

pub mod component;
pub mod constant;
pub mod noise;
pub mod response;
pub mod stress;

pub use component::{Capabilities, TimeSeriesComponent};
pub use constant::Constant;
pub use noise::{ExponentialNoise, NoiseModel};
pub use stress::StressModel;
