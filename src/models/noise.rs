//! Noise models: residual -> innovation filters.

use chrono::NaiveDateTime;

use crate::engine::params::ParameterRow;
use crate::error::{ModelError, ModelResult};
use crate::models::component::expect_params;
use crate::series::TimeSeries;

pub trait NoiseModel: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str {
        "noise"
    }

    fn parameters(&self) -> Vec<ParameterRow>;

    fn nparam(&self) -> usize {
        self.parameters().len()
    }

    /// Filter `residuals` into innovations.
    ///
    /// `gaps[i]` is the elapsed time in days between observation `i` and its
    /// predecessor in the full record (NaN for the very first observation).
    /// The result is indexed by `grid`, which has the same length as `residuals`.
    fn simulate(
        &self,
        residuals: &TimeSeries,
        gaps: &[f64],
        params: &[f64],
        grid: &[NaiveDateTime],
    ) -> ModelResult<TimeSeries>;
}

/// First-order exponential decay of the residual memory.
///
/// - `v_0 = r_0`
/// - `v_i = r_i - exp(-Δt_i / α) · r_{i-1}`
#[derive(Debug, Clone)]
pub struct ExponentialNoise {
    alpha: ParameterRow,
}

impl ExponentialNoise {
    pub fn new(initial_alpha: f64) -> Self {
        Self {
            alpha: ParameterRow::new("noise", "alpha", initial_alpha).bounded(Some(0.0), Some(5000.0)),
        }
    }
}

impl Default for ExponentialNoise {
    fn default() -> Self {
        Self::new(14.0)
    }
}

impl NoiseModel for ExponentialNoise {
    fn parameters(&self) -> Vec<ParameterRow> {
        vec![self.alpha.clone()]
    }

    fn nparam(&self) -> usize {
        1
    }

    fn simulate(
        &self,
        residuals: &TimeSeries,
        gaps: &[f64],
        params: &[f64],
        grid: &[NaiveDateTime],
    ) -> ModelResult<TimeSeries> {
        expect_params(self.name(), params, 1)?;
        if gaps.len() != residuals.len() || grid.len() != residuals.len() {
            return Err(ModelError::validation(format!(
                "noise filter inputs disagree in length (residuals {}, gaps {}, grid {})",
                residuals.len(),
                gaps.len(),
                grid.len()
            )));
        }

        let alpha = params[0];
        let r = residuals.values();
        let mut v = Vec::with_capacity(r.len());
        for i in 0..r.len() {
            if i == 0 {
                v.push(r[0]);
            } else {
                v.push(r[i] - (-gaps[i] / alpha).exp() * r[i - 1]);
            }
        }
        TimeSeries::new(grid.to_vec(), v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn filters_with_elapsed_time_decay() {
        let grid: Vec<NaiveDateTime> = [1, 2, 5]
            .iter()
            .map(|&d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .collect();
        let r = TimeSeries::new(grid.clone(), vec![1.0, 1.0, 1.0]).unwrap();
        let gaps = [f64::NAN, 1.0, 3.0];
        let v = ExponentialNoise::default()
            .simulate(&r, &gaps, &[2.0], &grid)
            .unwrap();

        assert_eq!(v.values()[0], 1.0);
        assert!((v.values()[1] - (1.0 - (-0.5f64).exp())).abs() < 1e-12);
        assert!((v.values()[2] - (1.0 - (-1.5f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn rejects_misaligned_inputs() {
        let grid = vec![NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()];
        let r = TimeSeries::constant(&grid, 1.0);
        assert!(
            ExponentialNoise::default()
                .simulate(&r, &[], &[1.0], &grid)
                .is_err()
        );
    }
}
