//! Shared pipeline logic for the `fit` and `synth` commands.
//!
//! Workflow for `fit`:
//! CSV ingest -> observed series cleaning -> model assembly -> calibration -> fit file
//!
//! `app` then focuses on presentation and exports.

use std::path::Path;

use tracing::{info, warn};

use crate::data::{SyntheticData, generate};
use crate::domain::{FitConfig, FitFile, SyntheticConfig};
use crate::engine::{FitOutcome, Initialization, Model, SolveOptions};
use crate::error::{AppError, ModelError};
use crate::fit::{LevenbergMarquardt, Solver};
use crate::io::{SeriesData, load_series_csv, read_fit_json, write_series_csv};
use crate::models::{Constant, ExponentialNoise, StressModel};
use crate::series::{ObservedSeries, TimeSeries};

/// All computed outputs of a single `tsfit fit` run.
#[derive(Debug)]
pub struct FitRun {
    pub model: Model,
    pub outcome: FitOutcome,
    pub input: SeriesData,
    pub fit_file: FitFile,
}

/// Load inputs, assemble the model and calibrate it.
pub fn run_fit(config: &FitConfig) -> Result<FitRun, AppError> {
    let input = load_series_csv(&config.obs_path, config.obs_column.as_deref())?;
    for e in &input.row_errors {
        warn!(line = e.line, "{}: {}", config.obs_path.display(), e.message);
    }

    let observed = ObservedSeries::from_raw(input.index.clone(), input.values.clone(), config.fill)?;
    info!(
        rows = input.rows_read,
        used = observed.len(),
        missing = input.missing(),
        fill = %config.fill,
        "observations loaded"
    );

    let name = config
        .obs_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.column.clone());
    let level = Constant::from_observed("constant", &observed);
    let mut model = Model::new(observed).with_name(name).with_frequency(config.freq);
    model.add_component(Box::new(level))?;

    for spec in &config.stresses {
        let stress = load_stress(&spec.path)?;
        let mut component = StressModel::new(spec.name.as_str(), stress)?;
        if spec.decreasing {
            component = component.decreasing();
        }
        model.add_component(Box::new(component))?;
    }
    if config.noise {
        model.set_noise_model(Box::new(ExponentialNoise::new(config.noise_alpha)));
    }

    let initialization = match &config.continue_from {
        Some(path) => {
            let previous = read_fit_json(path)?;
            model.restore_parameters(&previous.parameters)?;
            info!(from = %path.display(), "continuing from a previous fit");
            Initialization::Continue
        }
        None => Initialization::Fresh,
    };

    let solver = LevenbergMarquardt {
        max_iter: config.max_iter,
        tol_cost: config.tol_cost,
        tol_grad: config.tol_grad,
        ..LevenbergMarquardt::default()
    };
    let options = SolveOptions {
        tmin: config.tmin,
        tmax: config.tmax,
        noise: config.noise,
        initialization,
        // The binary prints the report itself.
        report: false,
    };
    let outcome = model.solve(options, &solver)?;

    let table = model.parameters().ok_or(ModelError::Unsolved)?;
    let fit_file = FitFile {
        model: model.name().to_string(),
        solver: solver.name().to_string(),
        window: outcome.window,
        noise: outcome.noise,
        sse: outcome.sse.is_finite().then_some(outcome.sse),
        converged: outcome.solver.converged,
        iterations: outcome.solver.iterations,
        parameters: table.rows().to_vec(),
        stderr: outcome.solver.stderr.clone(),
    };

    Ok(FitRun {
        model,
        outcome,
        input,
        fit_file,
    })
}

/// Write observed, simulated, residual (and innovation) columns at the
/// observation times inside the calibration window.
pub fn export_fitted_series(run: &FitRun, path: &Path) -> Result<(), AppError> {
    let model = &run.model;
    let window = run.outcome.window;
    let observed = model.observed().window(window.tmin(), window.tmax());

    let grid = model.frequency().covering_range(window.tmin(), window.tmax())?;
    let simulated = model.simulate_grid(None, &grid)?.sample_at(observed.index())?;
    let residuals = model.residuals(None, Some(window), false)?;

    let mut columns: Vec<(&str, &[f64])> = vec![
        ("observed", observed.values()),
        ("simulated", simulated.values()),
        ("residual", residuals.values()),
    ];
    let innovations = if run.outcome.noise {
        Some(model.residuals(None, Some(window), true)?)
    } else {
        None
    };
    if let Some(innovations) = &innovations {
        columns.push(("innovation", innovations.values()));
    }

    write_series_csv(path, observed.index(), &columns)
}

/// Generate synthetic data and write `stress.csv` + `observations.csv`.
pub fn run_synth(config: &SyntheticConfig) -> Result<SyntheticData, AppError> {
    let data = generate(config)?;

    std::fs::create_dir_all(&config.out_dir).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create output directory '{}': {e}", config.out_dir.display()),
        )
    })?;
    let stress = &data.stress;
    write_series_csv(
        &config.out_dir.join("stress.csv"),
        stress.index(),
        &[("stress", stress.values())],
    )?;
    let observed = &data.observed;
    write_series_csv(
        &config.out_dir.join("observations.csv"),
        observed.index(),
        &[("head", observed.values())],
    )?;

    info!(dir = %config.out_dir.display(), observations = observed.len(), "synthetic data written");
    Ok(data)
}

fn load_stress(path: &Path) -> Result<TimeSeries, AppError> {
    let data = load_series_csv(path, None)?;
    if !data.row_errors.is_empty() || data.missing() > 0 {
        return Err(AppError::new(
            2,
            format!(
                "Stress '{}' has {} unreadable rows and {} missing values; stresses must be complete.",
                path.display(),
                data.row_errors.len(),
                data.missing()
            ),
        ));
    }
    Ok(TimeSeries::new(data.index, data.values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StressSpec;
    use crate::series::{FillPolicy, Frequency};
    use chrono::NaiveDate;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tsfit-pipeline-{}-{name}", std::process::id()))
    }

    fn fit_config(dir: &Path) -> FitConfig {
        FitConfig {
            obs_path: dir.join("observations.csv"),
            obs_column: None,
            stresses: vec![StressSpec {
                name: "rain".to_string(),
                path: dir.join("stress.csv"),
                decreasing: false,
            }],
            fill: FillPolicy::Drop,
            freq: Frequency::DAILY,
            tmin: None,
            tmax: None,
            noise: false,
            noise_alpha: 14.0,
            continue_from: None,
            max_iter: 200,
            tol_cost: 1e-12,
            tol_grad: 1e-12,
            export_fit: None,
            export_series: None,
            report: false,
        }
    }

    #[test]
    fn synth_then_fit_recovers_generating_parameters() {
        let dir = temp_dir("roundtrip");
        let synth = SyntheticConfig {
            out_dir: dir.clone(),
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            days: 500,
            seed: 11,
            gain: 0.5,
            scale: 25.0,
            level: 10.0,
            noise_sd: 0.0,
            keep: 0.4,
        };
        run_synth(&synth).unwrap();

        let run = run_fit(&fit_config(&dir)).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        let optimal = run.model.parameters().unwrap().optimal_values().unwrap();
        let names: Vec<&str> = run.fit_file.parameters.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["constant_d", "rain_A", "rain_a"]);
        for (got, want) in optimal.iter().zip([10.0, 0.5, 25.0]) {
            assert!((got - want).abs() <= 0.05 * want, "got {got}, want {want}");
        }
        assert!(run.outcome.sse < 1e-6);
    }

    #[test]
    fn missing_observation_file_is_input_error() {
        let dir = temp_dir("missing");
        let err = run_fit(&fit_config(&dir)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
