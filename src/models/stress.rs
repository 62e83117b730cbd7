//! Stress-driven component: convolution of an input stress with an
//! exponential block response.
//!
//! Parameters (in slice order):
//! - `A`: gain (final response to a unit step)
//! - `a`: response time scale in days
//!
//! The stress must be equidistant; its step defines the block resolution.
//! The convolved series lives on the stress index and is sampled (linearly)
//! at the requested grid, so the stress must cover the whole grid.

use chrono::NaiveDateTime;

use crate::engine::params::ParameterRow;
use crate::error::{ModelError, ModelResult};
use crate::models::component::{Capabilities, TimeSeriesComponent, expect_params};
use crate::models::response::block;
use crate::series::{TimeSeries, elapsed_days};

/// Relative tolerance when checking that stress timestamps are equidistant.
const STEP_TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct StressModel {
    name: String,
    stress: TimeSeries,
    step_days: f64,
    gain: ParameterRow,
    scale: ParameterRow,
}

impl StressModel {
    pub fn new(name: impl Into<String>, stress: TimeSeries) -> ModelResult<Self> {
        let name = name.into();
        if stress.len() < 2 {
            return Err(ModelError::validation(format!(
                "stress for `{name}` needs at least two samples"
            )));
        }
        if let Some((t, _)) = stress.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::validation(format!(
                "stress for `{name}` holds a non-finite value at {t}"
            )));
        }

        let index = stress.index();
        let step_days = elapsed_days(index[0], index[1]);
        let irregular = index
            .windows(2)
            .any(|w| (elapsed_days(w[0], w[1]) - step_days).abs() > STEP_TOL * step_days);
        if irregular {
            return Err(ModelError::validation(format!(
                "stress for `{name}` must be equidistant"
            )));
        }

        let gain = ParameterRow::new(&name, "A", 1.0).bounded(Some(0.0), None);
        let scale = ParameterRow::new(&name, "a", 10.0).bounded(Some(0.01), Some(5000.0));
        Ok(Self {
            name,
            stress,
            step_days,
            gain,
            scale,
        })
    }

    /// Flip the sign convention so the gain is non-positive (e.g. evaporation).
    pub fn decreasing(mut self) -> Self {
        self.gain.initial = -self.gain.initial.abs();
        self.gain.pmin = None;
        self.gain.pmax = Some(0.0);
        self
    }

    fn convolve(&self, b: &[f64]) -> Vec<f64> {
        let s = self.stress.values();
        (0..s.len())
            .map(|j| {
                let kmax = j.min(b.len().saturating_sub(1));
                (0..=kmax).map(|k| b[k] * s[j - k]).sum()
            })
            .collect()
    }
}

impl TimeSeriesComponent for StressModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Vec<ParameterRow> {
        vec![self.gain.clone(), self.scale.clone()]
    }

    fn nparam(&self) -> usize {
        2
    }

    fn simulate(&self, params: &[f64], grid: &[NaiveDateTime]) -> ModelResult<TimeSeries> {
        expect_params(&self.name, params, 2)?;
        let b = block(params[0], params[1], self.step_days);
        if b.is_empty() {
            // Degenerate scale: let the residual health check surface it.
            return Ok(TimeSeries::constant(grid, f64::NAN));
        }
        let response = TimeSeries::new(self.stress.index().to_vec(), self.convolve(&b))?;
        response.sample_at(grid).map_err(|_| {
            ModelError::validation(format!(
                "stress for `{}` does not cover the simulation grid",
                self.name
            ))
        })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            response_curve: true,
            stress: true,
        }
    }

    fn response_curve(&self, params: &[f64]) -> ModelResult<Vec<f64>> {
        expect_params(&self.name, params, 2)?;
        Ok(block(params[0], params[1], self.step_days))
    }

    fn reconstruct_stress(&self, params: &[f64]) -> ModelResult<TimeSeries> {
        expect_params(&self.name, params, 2)?;
        Ok(self.stress.clone())
    }
}
