//! Calibration.
//!
//! Responsibilities:
//!
//! - the `Solver` seam and the objective view handed to it
//! - a bounded Levenberg-Marquardt implementation (parallel Jacobian)

pub mod levmar;
pub mod solver;

pub use levmar::*;
pub use solver::*;
