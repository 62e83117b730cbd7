//! `tsfit` library crate: transfer-function time series models.
//!
//! A `Model` combines an observed series with named response components and
//! an optional noise model, and calibrates their parameters against the
//! observations. The binary (`tsfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - components, noise models and solvers can be plugged in from other crates

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod series;
pub mod telemetry;
