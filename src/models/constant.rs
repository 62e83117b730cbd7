//! Constant offset component (e.g. the drainage base of a head series).

use chrono::NaiveDateTime;

use crate::engine::params::ParameterRow;
use crate::error::ModelResult;
use crate::models::component::{TimeSeriesComponent, expect_params};
use crate::series::{ObservedSeries, TimeSeries};

#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    initial: f64,
    pmin: Option<f64>,
    pmax: Option<f64>,
    vary: bool,
}

impl Constant {
    pub fn new(name: impl Into<String>, initial: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            pmin: None,
            pmax: None,
            vary: true,
        }
    }

    /// Constant whose initial value is the mean of the observations.
    pub fn from_observed(name: impl Into<String>, observed: &ObservedSeries) -> Self {
        Self::new(name, observed.mean())
    }

    pub fn with_bounds(mut self, pmin: Option<f64>, pmax: Option<f64>) -> Self {
        self.pmin = pmin;
        self.pmax = pmax;
        self
    }

    /// Keep the level at its initial value during calibration.
    pub fn fixed(mut self) -> Self {
        self.vary = false;
        self
    }
}

impl TimeSeriesComponent for Constant {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Vec<ParameterRow> {
        let row = ParameterRow::new(&self.name, "d", self.initial).bounded(self.pmin, self.pmax);
        vec![if self.vary { row } else { row.fixed() }]
    }

    fn nparam(&self) -> usize {
        1
    }

    fn simulate(&self, params: &[f64], grid: &[NaiveDateTime]) -> ModelResult<TimeSeries> {
        expect_params(&self.name, params, 1)?;
        Ok(TimeSeries::constant(grid, params[0]))
    }
}
