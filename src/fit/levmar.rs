//! Bounded Levenberg-Marquardt on the model residuals.
//!
//! Per iteration:
//!
//! - a forward-difference Jacobian over the free parameters (columns in parallel)
//! - a damped Gauss-Newton step from the augmented system `[J; √λ·D] δ = [-r; 0]`
//! - projection of the trial point onto the parameter bounds
//! - accept if the cost decreases (λ shrinks), otherwise grow λ and retry
//!
//! Fixed (`vary = false`) parameters stay at their initial value. Standard
//! errors come from `s²·(JᵀJ)⁻¹` at the optimum.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{ModelError, ModelResult};
use crate::fit::solver::{CalibrationProblem, Solver, SolverResult};
use crate::math::{normal_covariance, solve_least_squares};
use crate::report::{FitSummary, format_fit_report};

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardt {
    pub max_iter: usize,
    /// Stop once an accepted step reduces the cost by less than this fraction.
    pub tol_cost: f64,
    /// Stop once `max |Jᵀr|` falls below this.
    pub tol_grad: f64,
    pub lambda_init: f64,
    /// Relative forward-difference step.
    pub fd_step: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_cost: 1e-12,
            tol_grad: 1e-12,
            lambda_init: 1e-3,
            fd_step: 1e-7,
        }
    }
}

impl LevenbergMarquardt {
    fn evaluate(&self, problem: &CalibrationProblem<'_>, x: &[f64]) -> ModelResult<Vec<f64>> {
        Ok(problem.residuals(x)?.values().to_vec())
    }

    fn jacobian(
        &self,
        problem: &CalibrationProblem<'_>,
        x: &[f64],
        r: &[f64],
        free: &[usize],
    ) -> ModelResult<DMatrix<f64>> {
        let rows = problem.parameters().rows();
        let columns = free
            .par_iter()
            .map(|&i| {
                let row = &rows[i];
                let h = self.fd_step * x[i].abs().max(1.0);
                let mut shifted = row.clamp(x[i] + h);
                if shifted == x[i] {
                    // Sitting on the upper bound.
                    shifted = row.clamp(x[i] - h);
                }
                let dh = shifted - x[i];
                if dh == 0.0 {
                    return Ok(vec![0.0; r.len()]);
                }

                let mut xp = x.to_vec();
                xp[i] = shifted;
                let rp = self.evaluate(problem, &xp)?;
                if rp.len() != r.len() {
                    return Err(ModelError::Solver(format!(
                        "residual length changed from {} to {} while differentiating `{}`",
                        r.len(),
                        rp.len(),
                        row.name
                    )));
                }
                Ok(rp
                    .iter()
                    .zip(r)
                    .map(|(a, b)| {
                        let d = (a - b) / dh;
                        if d.is_finite() { d } else { 0.0 }
                    })
                    .collect::<Vec<f64>>())
            })
            .collect::<ModelResult<Vec<Vec<f64>>>>()?;

        trace!(ncols = columns.len(), nrows = r.len(), "jacobian evaluated");
        Ok(DMatrix::from_fn(r.len(), free.len(), |i, c| columns[c][i]))
    }
}

impl Solver for LevenbergMarquardt {
    fn name(&self) -> &str {
        "levenberg-marquardt"
    }

    fn solve(&self, problem: &CalibrationProblem<'_>) -> ModelResult<SolverResult> {
        let table = problem.parameters();
        let rows = table.rows();
        let mut x: Vec<f64> = rows.iter().map(|row| row.clamp(row.initial)).collect();
        let free: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.vary)
            .map(|(i, _)| i)
            .collect();

        let mut r = self.evaluate(problem, &x)?;
        let mut nfev = 1;
        let mut cost = sum_sq(&r);
        if !cost.is_finite() {
            return Err(ModelError::Solver(format!(
                "objective is not finite at the initial parameters (sse = {cost})"
            )));
        }

        let mut lambda = self.lambda_init;
        let mut scale = vec![MIN_SCALE; free.len()];
        let mut iterations = 0;
        let mut outcome: Option<(bool, &str)> = None;

        if free.is_empty() {
            outcome = Some((true, "no free parameters"));
        }

        'outer: while outcome.is_none() && iterations < self.max_iter {
            iterations += 1;
            let j = self.jacobian(problem, &x, &r, &free)?;
            nfev += free.len();

            let rv = DVector::from_column_slice(&r);
            let grad = j.transpose() * &rv;
            if grad.amax() <= self.tol_grad {
                outcome = Some((true, "gradient below tolerance"));
                break;
            }
            for (c, s) in scale.iter_mut().enumerate() {
                *s = s.max(j.column(c).norm());
            }

            let mut accepted = false;
            while lambda <= LAMBDA_MAX {
                let Some(step) = damped_step(&j, &rv, lambda, &scale) else {
                    lambda *= 10.0;
                    continue;
                };

                let mut candidate = x.clone();
                for (c, &i) in free.iter().enumerate() {
                    candidate[i] = rows[i].clamp(x[i] + step[c]);
                }
                if candidate == x {
                    break;
                }

                let r_new = self.evaluate(problem, &candidate)?;
                nfev += 1;
                let cost_new = sum_sq(&r_new);
                if cost_new.is_finite() && cost_new < cost {
                    let reduction = (cost - cost_new) / cost;
                    x = candidate;
                    r = r_new;
                    cost = cost_new;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    accepted = true;
                    debug!(iteration = iterations, cost, lambda, "step accepted");
                    if cost == 0.0 || reduction <= self.tol_cost {
                        outcome = Some((true, "relative cost reduction below tolerance"));
                        break 'outer;
                    }
                    break;
                }
                lambda *= 10.0;
            }

            if !accepted {
                outcome = Some((true, "no further improvement possible"));
            }
        }

        let (converged, message) = match outcome {
            Some((converged, message)) => (converged, message.to_string()),
            None => (false, format!("maximum iterations ({}) reached", self.max_iter)),
        };

        let mut stderr = vec![None; rows.len()];
        let dof = r.len().saturating_sub(free.len());
        if !free.is_empty() && dof > 0 {
            let j = self.jacobian(problem, &x, &r, &free)?;
            nfev += free.len();
            if let Some(cov) = normal_covariance(&j) {
                let s2 = cost / dof as f64;
                for (c, &i) in free.iter().enumerate() {
                    let var = s2 * cov[(c, c)];
                    stderr[i] = (var >= 0.0).then(|| var.sqrt());
                }
            }
        }

        debug!(iterations, nfev, cost, converged, "levenberg-marquardt finished");

        let summary = FitSummary {
            model: problem.model().name(),
            solver: self.name(),
            window: problem.window(),
            noise: problem.noise(),
            nobs: r.len(),
            sse: cost,
            converged,
            message: &message,
            iterations,
            nfev,
        };
        let report = format_fit_report(table, &x, &stderr, &summary);

        Ok(SolverResult {
            optimal: x,
            stderr,
            report,
            converged,
            message,
            iterations,
            nfev,
        })
    }
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Minimise `‖J δ + r‖² + λ‖D δ‖²` through the augmented least squares system.
fn damped_step(j: &DMatrix<f64>, r: &DVector<f64>, lambda: f64, scale: &[f64]) -> Option<DVector<f64>> {
    let (n, k) = j.shape();
    let mut a = DMatrix::<f64>::zeros(n + k, k);
    a.view_mut((0, 0), (n, k)).copy_from(j);
    let damping = lambda.sqrt();
    for (c, s) in scale.iter().enumerate() {
        a[(n + c, c)] = damping * s;
    }

    let mut b = DVector::<f64>::zeros(n + k);
    for i in 0..n {
        b[i] = -r[i];
    }
    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;
    use crate::engine::{Model, SolveOptions};
    use crate::models::{Constant, StressModel};
    use crate::series::{Frequency, ObservedSeries, TimeSeries};

    fn daily(n: i64) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2012, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Frequency::DAILY.date_range(start, start + TimeDelta::days(n - 1)).unwrap()
    }

    fn rain(index: &[NaiveDateTime]) -> TimeSeries {
        let values = (0..index.len())
            .map(|i| match i % 9 {
                0 => 6.0,
                1 | 4 => 2.5,
                _ => 0.3,
            })
            .collect();
        TimeSeries::new(index.to_vec(), values).unwrap()
    }

    /// Observations generated by the model itself at `truth`.
    fn synthetic_model(truth: &[f64]) -> Model {
        let index = daily(240);
        let stress = rain(&index);

        let mut generator = Model::new(ObservedSeries::from_series(TimeSeries::zeros(&index)).unwrap());
        generator.add_component(Box::new(Constant::new("base", 0.0))).unwrap();
        generator
            .add_component(Box::new(StressModel::new("rain", stress.clone()).unwrap()))
            .unwrap();
        let window = crate::engine::CalibrationWindow::new(index[0], index[index.len() - 1]).unwrap();
        let head = generator.simulate(Some(truth), Some(window)).unwrap();

        let mut model = Model::new(ObservedSeries::from_series(head).unwrap());
        model.add_component(Box::new(Constant::new("base", 0.0))).unwrap();
        model.add_component(Box::new(StressModel::new("rain", stress).unwrap())).unwrap();
        model
    }

    fn quiet() -> SolveOptions {
        SolveOptions {
            noise: false,
            report: false,
            ..SolveOptions::default()
        }
    }

    #[test]
    fn recovers_stress_response_parameters() {
        let truth = [1.5, 2.0, 15.0];
        let mut model = synthetic_model(&truth);
        let outcome = model.solve(quiet(), &LevenbergMarquardt::default()).unwrap();

        let optimal = model.parameters().unwrap().optimal_values().unwrap();
        for (got, want) in optimal.iter().zip(truth) {
            assert!((got - want).abs() <= 0.05 * want.abs(), "got {got}, want {want}");
        }
        assert!(outcome.solver.converged, "{}", outcome.solver.message);
        assert!(outcome.sse < 1e-6);
        assert_eq!(outcome.solver.stderr.len(), 3);
    }

    #[test]
    fn fixed_parameters_keep_their_initial_value() {
        let index = daily(20);
        let obs = ObservedSeries::from_series(TimeSeries::constant(&index, 3.0)).unwrap();
        let mut model = Model::new(obs);
        model.add_component(Box::new(Constant::new("a", 1.0).fixed())).unwrap();
        model.add_component(Box::new(Constant::new("b", 0.5))).unwrap();

        let outcome = model.solve(quiet(), &LevenbergMarquardt::default()).unwrap();
        let optimal = model.parameters().unwrap().optimal_values().unwrap();
        assert_eq!(optimal[0], 1.0);
        assert!((optimal[1] - 2.0).abs() < 1e-6);
        assert_eq!(outcome.solver.stderr[0], None);
    }

    #[test]
    fn respects_bounds() {
        let index = daily(15);
        let obs = ObservedSeries::from_series(TimeSeries::constant(&index, 5.0)).unwrap();
        let mut model = Model::new(obs);
        model
            .add_component(Box::new(Constant::new("a", 0.0).with_bounds(Some(-1.0), Some(2.0))))
            .unwrap();
        model.solve(quiet(), &LevenbergMarquardt::default()).unwrap();
        let optimal = model.parameters().unwrap().optimal_values().unwrap();
        assert_eq!(optimal[0], 2.0);
    }

    #[test]
    fn non_finite_start_is_a_solver_error() {
        let index = daily(10);
        let obs = ObservedSeries::from_series(TimeSeries::constant(&index, 1.0)).unwrap();
        let mut model = Model::new(obs);
        model.add_component(Box::new(Constant::new("a", f64::INFINITY))).unwrap();
        assert!(matches!(
            model.solve(quiet(), &LevenbergMarquardt::default()),
            Err(ModelError::Solver(_))
        ));
    }
}
