//! The composite transfer-function model.
//!
//! A `Model` owns:
//!
//! - the cleaned observed series (immutable after construction)
//! - the ordered component registry and an optional noise model
//! - the current parameter table snapshot and calibration window
//!
//! Simulation is strictly additive: each component receives the slice of the
//! flat parameter vector recorded for it in the table's slot map and its
//! contribution is summed onto a zero series over the grid.
//!
//! Defaults differ: `simulate` falls back to the stored
//! calibration window, while `residuals` falls back to `ResidualWindow`
//! (the full observed record unless configured otherwise).

use std::borrow::Cow;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::engine::params::{ParameterRow, ParameterTable};
use crate::engine::registry::ComponentRegistry;
use crate::engine::window::CalibrationWindow;
use crate::error::{Capability, ModelError, ModelResult, ModelWarning};
use crate::fit::{CalibrationProblem, Solver, SolverResult};
use crate::models::{NoiseModel, TimeSeriesComponent};
use crate::series::{Frequency, ObservedSeries, TimeSeries};

/// How `initialize` seeds the initial column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initialization {
    /// Use each component's own initial values.
    #[default]
    Fresh,
    /// Use the optimal values of the previous (identically shaped) table.
    Continue,
}

/// Default window for `residuals` when none is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidualWindow {
    #[default]
    ObservedExtent,
    Calibration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    pub tmin: Option<NaiveDateTime>,
    pub tmax: Option<NaiveDateTime>,
    pub noise: bool,
    pub initialization: Initialization,
    /// Emit the solver report through the log once finished.
    pub report: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tmin: None,
            tmax: None,
            noise: true,
            initialization: Initialization::Fresh,
            report: true,
        }
    }
}

/// Residuals (or innovations) plus the warnings raised while computing them.
#[derive(Debug, Clone, PartialEq)]
pub struct Residuals {
    series: TimeSeries,
    warnings: Vec<ModelWarning>,
}

impl Residuals {
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn values(&self) -> &[f64] {
        self.series.values()
    }

    pub fn warnings(&self) -> &[ModelWarning] {
        &self.warnings
    }

    /// Sum of squares of exactly these residuals.
    pub fn sse(&self) -> f64 {
        self.series.sum_of_squares()
    }
}

/// Result of `Model::solve`.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub solver: SolverResult,
    pub window: CalibrationWindow,
    /// Whether the noise model was actually used.
    pub noise: bool,
    /// Objective value at the optimum.
    pub sse: f64,
    pub warnings: Vec<ModelWarning>,
}

#[derive(Debug)]
pub struct Model {
    name: String,
    observed: ObservedSeries,
    registry: ComponentRegistry,
    noise: Option<Box<dyn NoiseModel>>,
    parameters: Option<ParameterTable>,
    window: Option<CalibrationWindow>,
    freq: Frequency,
    residual_window: ResidualWindow,
    report: Option<String>,
}

impl Model {
    pub fn new(observed: ObservedSeries) -> Self {
        Self {
            name: "model".to_string(),
            observed,
            registry: ComponentRegistry::new(),
            noise: None,
            parameters: None,
            window: None,
            freq: Frequency::DAILY,
            residual_window: ResidualWindow::default(),
            report: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sampling frequency of simulation grids.
    pub fn with_frequency(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_residual_window(mut self, policy: ResidualWindow) -> Self {
        self.residual_window = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observed(&self) -> &ObservedSeries {
        &self.observed
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn noise_model(&self) -> Option<&dyn NoiseModel> {
        self.noise.as_deref()
    }

    pub fn parameters(&self) -> Option<&ParameterTable> {
        self.parameters.as_ref()
    }

    pub fn window(&self) -> Option<CalibrationWindow> {
        self.window
    }

    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn add_component(&mut self, component: Box<dyn TimeSeriesComponent>) -> ModelResult<()> {
        self.registry.add(component)
    }

    pub fn remove_component(&mut self, name: &str) -> ModelResult<Box<dyn TimeSeriesComponent>> {
        self.registry.remove(name)
    }

    pub fn set_noise_model(&mut self, noise: Box<dyn NoiseModel>) {
        self.noise = Some(noise);
    }

    pub fn clear_noise_model(&mut self) -> Option<Box<dyn NoiseModel>> {
        self.noise.take()
    }

    /// Rebuild the parameter table.
    ///
    /// Rows: every component fragment in registry order, then the noise
    /// fragment if `noise` is set and a noise model is configured.
    pub fn initialize(&mut self, init: Initialization, noise: bool) -> ModelResult<()> {
        let noise_model = if noise { self.noise.as_deref() } else { None };
        let table = ParameterTable::build(&self.registry, noise_model)?;
        let table = match init {
            Initialization::Fresh => table,
            Initialization::Continue => {
                let previous = self.parameters.as_ref().ok_or(ModelError::Unsolved)?;
                table.continue_from(previous)?
            }
        };
        debug!(nparam = table.len(), noise = table.noise_slot().is_some(), "parameter table built");
        self.parameters = Some(table);
        Ok(())
    }

    /// Install the optimal column of an earlier fit (e.g. from a fit file).
    ///
    /// `rows` must match, name for name and in order, the table this model
    /// builds now (with noise rows iff `rows` carries more than the
    /// component parameters). Afterwards `Initialization::Continue` and the
    /// default-parameter paths use these values.
    pub fn restore_parameters(&mut self, rows: &[ParameterRow]) -> ModelResult<()> {
        let with_noise = rows.len() > self.registry.total_nparam();
        let noise_model = if with_noise { self.noise.as_deref() } else { None };
        let table = ParameterTable::build(&self.registry, noise_model)?;

        let names_match = table.len() == rows.len()
            && table.rows().iter().zip(rows).all(|(a, b)| a.name == b.name);
        if !names_match {
            let expected: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
            let found: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
            return Err(ModelError::validation(format!(
                "stored parameters [{}] do not match this model's parameters [{}]",
                found.join(", "),
                expected.join(", ")
            )));
        }

        let optimal = rows
            .iter()
            .map(|r| r.optimal.ok_or(ModelError::Unsolved))
            .collect::<ModelResult<Vec<f64>>>()?;
        self.parameters = Some(table.with_optimal(&optimal)?);
        Ok(())
    }

    /// Validate and store the calibration window (defaults: observed extent).
    pub fn set_tmin_tmax(
        &mut self,
        tmin: Option<NaiveDateTime>,
        tmax: Option<NaiveDateTime>,
    ) -> ModelResult<CalibrationWindow> {
        let window = CalibrationWindow::resolve(&self.observed, tmin, tmax)?;
        self.window = Some(window);
        Ok(window)
    }

    /// Simulate over an equidistant grid spanning the window (inclusive).
    ///
    /// `params` defaults to the optimal column; `window` defaults to the
    /// stored calibration window.
    pub fn simulate(&self, params: Option<&[f64]>, window: Option<CalibrationWindow>) -> ModelResult<TimeSeries> {
        let window = window.or(self.window).ok_or(ModelError::Unsolved)?;
        let grid = self.freq.date_range(window.tmin(), window.tmax())?;
        self.simulate_grid(params, &grid)
    }

    /// Simulate over an arbitrary (strictly increasing) grid.
    pub fn simulate_grid(&self, params: Option<&[f64]>, grid: &[NaiveDateTime]) -> ModelResult<TimeSeries> {
        let (p, layout) = self.resolve_params(params)?;
        self.compose(&p, &layout, grid)
    }

    /// Per-component contributions over the window grid, in registry order.
    pub fn decomposition(
        &self,
        params: Option<&[f64]>,
        window: Option<CalibrationWindow>,
    ) -> ModelResult<Vec<(String, TimeSeries)>> {
        let window = window.or(self.window).ok_or(ModelError::Unsolved)?;
        let grid = self.freq.date_range(window.tmin(), window.tmax())?;
        let (p, layout) = self.resolve_params(params)?;
        layout
            .component_slots()
            .map(|slot| {
                let component = self.registry.get(&slot.owner)?;
                let contribution = component.simulate(layout.slice(&slot.owner, &p)?, &grid)?;
                Ok((slot.owner.clone(), contribution))
            })
            .collect()
    }

    /// Observed minus simulated at the observation times inside the window,
    /// optionally filtered into innovations by the noise model.
    pub fn residuals(
        &self,
        params: Option<&[f64]>,
        window: Option<CalibrationWindow>,
        noise: bool,
    ) -> ModelResult<Residuals> {
        let window = match window {
            Some(w) => w,
            None => match self.residual_window {
                ResidualWindow::ObservedExtent => CalibrationWindow::observed_extent(&self.observed)?,
                ResidualWindow::Calibration => self.window.ok_or(ModelError::Unsolved)?,
            },
        };
        let (tmin, tmax) = (window.tmin(), window.tmax());

        let observed = self.observed.window(tmin, tmax);
        if observed.is_empty() {
            return Err(ModelError::validation(format!(
                "no observations between {tmin} and {tmax}"
            )));
        }

        let (p, layout) = self.resolve_params(params)?;
        let grid = self.freq.covering_range(tmin, tmax)?;
        let simulated = self.compose(&p, &layout, &grid)?.sample_at(observed.index())?;
        let mut series = observed.sub_aligned(&simulated)?;

        let mut warnings = Vec::new();
        if noise {
            match (self.noise.as_deref(), layout.noise_slot()) {
                (Some(noise_model), Some(slot)) if p.len() == layout.len() => {
                    let gaps = self.observed.gaps_in(tmin, tmax);
                    series = noise_model.simulate(&series, gaps, &p[slot.range.clone()], observed.index())?;
                }
                (None, _) => warnings.push(ModelWarning::NoiseModelUnavailable {
                    reason: "no noise model is configured".to_string(),
                }),
                _ => warnings.push(ModelWarning::NoiseModelUnavailable {
                    reason: "the parameter vector carries no noise parameters".to_string(),
                }),
            }
        }

        let sse = series.sum_of_squares();
        if sse.is_nan() {
            warnings.push(ModelWarning::NumericInstability { sse });
        }
        for w in &warnings {
            warn!(model = %self.name, "{w}");
        }

        Ok(Residuals { series, warnings })
    }

    /// Sum of squared `residuals`.
    pub fn sse(&self, params: Option<&[f64]>, window: Option<CalibrationWindow>, noise: bool) -> ModelResult<f64> {
        Ok(self.residuals(params, window, noise)?.sse())
    }

    /// Calibrate all free parameters with `solver`.
    pub fn solve(&mut self, options: SolveOptions, solver: &dyn Solver) -> ModelResult<FitOutcome> {
        let mut warnings = Vec::new();
        let noise = if options.noise && self.noise.is_none() {
            let w = ModelWarning::NoiseModelUnavailable {
                reason: "noise requested for calibration but no noise model is configured".to_string(),
            };
            warn!(model = %self.name, "{w}");
            warnings.push(w);
            false
        } else {
            options.noise
        };

        let window = self.set_tmin_tmax(options.tmin, options.tmax)?;
        self.initialize(options.initialization, noise)?;

        let result = {
            let problem = CalibrationProblem::new(self, window, noise)?;
            solver.solve(&problem)?
        };

        let table = self.parameters.clone().ok_or(ModelError::Unsolved)?;
        self.parameters = Some(table.with_optimal(&result.optimal)?);
        self.report = Some(result.report.clone());

        let residuals = self.residuals(None, Some(window), noise)?;
        let sse = residuals.sse();
        warnings.extend(residuals.warnings);

        info!(
            model = %self.name,
            sse,
            iterations = result.iterations,
            converged = result.converged,
            "calibration finished"
        );
        if options.report {
            info!("\n{}", result.report);
        }

        Ok(FitOutcome {
            solver: result,
            window,
            noise,
            sse,
            warnings,
        })
    }

    /// Contribution of one component over the calibration window, at its optimal parameters.
    pub fn get_response(&self, name: &str) -> ModelResult<TimeSeries> {
        let component = self.registry.get(name)?;
        let params = self.optimal_slice(name)?;
        let window = self.window.ok_or(ModelError::Unsolved)?;
        let grid = self.freq.date_range(window.tmin(), window.tmax())?;
        component.simulate(&params, &grid)
    }

    /// Block response of one component at its optimal parameters.
    pub fn get_response_function(&self, name: &str) -> ModelResult<Vec<f64>> {
        let component = self.registry.get_capable(name, Capability::ResponseCurve)?;
        let params = self.optimal_slice(name)?;
        component.response_curve(&params)
    }

    /// Input stress of one component at its optimal parameters.
    pub fn get_stress(&self, name: &str) -> ModelResult<TimeSeries> {
        let component = self.registry.get_capable(name, Capability::Stress)?;
        let params = self.optimal_slice(name)?;
        component.reconstruct_stress(&params)
    }

    fn optimal_slice(&self, name: &str) -> ModelResult<Vec<f64>> {
        let table = self.current_table()?;
        let optimal = table.optimal_values().ok_or(ModelError::Unsolved)?;
        Ok(table.slice(name, &optimal)?.to_vec())
    }

    /// Stored table, provided it still matches the registry.
    fn current_table(&self) -> ModelResult<&ParameterTable> {
        let table = self.parameters.as_ref().ok_or(ModelError::Unsolved)?;
        if table.revision() != self.registry.revision() {
            return Err(ModelError::validation(
                "components changed since the parameter table was built; call initialize or solve again",
            ));
        }
        Ok(table)
    }

    /// Layout used to slice an explicit vector of `len` entries.
    ///
    /// The stored table is reused when it is current and has that shape.
    /// Otherwise a provisional table is built from the registry and the
    /// configured noise model, so a vector carrying noise parameters is
    /// sliced the same way whether or not the last solve used noise.
    fn layout(&self, len: usize) -> ModelResult<Cow<'_, ParameterTable>> {
        if let Some(table) = &self.parameters {
            let current = table.revision() == self.registry.revision();
            if current && (len == table.len() || len == table.component_len()) {
                return Ok(Cow::Borrowed(table));
            }
        }

        let built = ParameterTable::build(&self.registry, self.noise.as_deref())?;
        if len == built.len() || len == built.component_len() {
            return Ok(Cow::Owned(built));
        }
        let expected = if built.noise_slot().is_some() {
            format!("{} (components) or {} (with noise)", built.component_len(), built.len())
        } else {
            built.component_len().to_string()
        };
        Err(ModelError::validation(format!(
            "parameter vector has {len} entries; expected {expected}"
        )))
    }

    fn resolve_params<'a>(
        &'a self,
        params: Option<&'a [f64]>,
    ) -> ModelResult<(Cow<'a, [f64]>, Cow<'a, ParameterTable>)> {
        match params {
            Some(p) => Ok((Cow::Borrowed(p), self.layout(p.len())?)),
            None => {
                let table = self.current_table()?;
                let optimal = table.optimal_values().ok_or(ModelError::Unsolved)?;
                Ok((Cow::Owned(optimal), Cow::Borrowed(table)))
            }
        }
    }

    fn compose(&self, p: &[f64], layout: &ParameterTable, grid: &[NaiveDateTime]) -> ModelResult<TimeSeries> {
        let mut total = TimeSeries::zeros(grid);
        for slot in layout.component_slots() {
            let component = self.registry.get(&slot.owner)?;
            let contribution = component.simulate(layout.slice(&slot.owner, p)?, grid)?;
            total.add_aligned(&contribution).map_err(|_| {
                ModelError::validation(format!(
                    "component `{}` returned a series that is not aligned with the grid",
                    slot.owner
                ))
            })?;
        }
        Ok(total)
    }
}
