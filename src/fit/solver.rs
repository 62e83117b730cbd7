//! Solver interface.
//!
//! The model hands a solver a `CalibrationProblem`: a read-only view of the
//! model, the freshly built parameter table (initial values, bounds, vary
//! flags) and the objective settings. The solver returns the optimal vector
//! (same length and order as the table) and a human-readable report.

use crate::engine::{CalibrationWindow, Model, ParameterTable, Residuals};
use crate::error::{ModelError, ModelResult};

pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, problem: &CalibrationProblem<'_>) -> ModelResult<SolverResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    /// Row-aligned with the parameter table.
    pub optimal: Vec<f64>,
    /// Standard errors; `None` for fixed parameters or a singular Jacobian.
    pub stderr: Vec<Option<f64>>,
    pub report: String,
    pub converged: bool,
    pub message: String,
    pub iterations: usize,
    /// Objective evaluations (including Jacobian columns).
    pub nfev: usize,
}

/// Objective view handed to a solver.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationProblem<'a> {
    model: &'a Model,
    table: &'a ParameterTable,
    window: CalibrationWindow,
    noise: bool,
}

impl<'a> CalibrationProblem<'a> {
    /// Requires an initialized parameter table on `model`.
    pub fn new(model: &'a Model, window: CalibrationWindow, noise: bool) -> ModelResult<Self> {
        let table = model.parameters().ok_or(ModelError::Unsolved)?;
        Ok(Self {
            model,
            table,
            window,
            noise,
        })
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn parameters(&self) -> &'a ParameterTable {
        self.table
    }

    pub fn window(&self) -> CalibrationWindow {
        self.window
    }

    pub fn noise(&self) -> bool {
        self.noise
    }

    /// Residuals (or innovations) over the calibration window for `params`.
    pub fn residuals(&self, params: &[f64]) -> ModelResult<Residuals> {
        self.table.check_len(params)?;
        self.model.residuals(Some(params), Some(self.window), self.noise)
    }

    pub fn cost(&self, params: &[f64]) -> ModelResult<f64> {
        Ok(self.residuals(params)?.sse())
    }
}
