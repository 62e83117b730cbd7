//! Top-level application orchestration.
//!
//! `src/main.rs` only calls into this module, which:
//! - loads `.env` and installs the tracing subscriber
//! - parses CLI arguments
//! - runs calibration or synthetic data generation
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, SynthArgs};
use crate::domain::{FitConfig, StressSpec, SyntheticConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tsfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    crate::telemetry::init_tracing()?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    if config.report {
        println!("{}", run.outcome.solver.report);
    }
    let warnings = crate::report::format_warnings(&run.outcome.warnings);
    if !warnings.is_empty() {
        eprint!("{warnings}");
    }
    if !run.input.row_errors.is_empty() {
        eprintln!(
            "skipped {} of {} input rows (see log for details)",
            run.input.row_errors.len(),
            run.input.rows_read
        );
    }

    // Optional exports.
    if let Some(path) = &config.export_fit {
        crate::io::export::write_fit_json(path, &run.fit_file)?;
    }
    if let Some(path) = &config.export_series {
        pipeline::export_fitted_series(&run, path)?;
    }

    if run.outcome.solver.converged {
        Ok(())
    } else {
        Err(AppError::new(4, format!("Calibration did not converge: {}", run.outcome.solver.message)))
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = synthetic_config_from_args(&args);
    let data = pipeline::run_synth(&config)?;
    println!(
        "wrote {} stress values and {} observations to {} (level={}, gain={}, scale={})",
        data.stress.len(),
        data.observed.len(),
        config.out_dir.display(),
        data.truth[0],
        data.truth[1],
        data.truth[2],
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        obs_path: args.obs.clone(),
        obs_column: args.obs_column.clone(),
        stresses: args
            .stresses
            .iter()
            .cloned()
            .chain(args.decreasing_stresses.iter().map(|s| StressSpec {
                decreasing: true,
                ..s.clone()
            }))
            .collect(),
        fill: args.fill,
        freq: args.freq,
        tmin: args.tmin,
        tmax: args.tmax,
        noise: args.noise,
        noise_alpha: args.noise_alpha,
        continue_from: args.continue_from.clone(),
        max_iter: args.max_iter,
        tol_cost: args.tol_cost,
        tol_grad: args.tol_grad,
        export_fit: args.export_fit.clone(),
        export_series: args.export_series.clone(),
        report: !args.no_report,
    }
}

pub fn synthetic_config_from_args(args: &SynthArgs) -> SyntheticConfig {
    SyntheticConfig {
        out_dir: args.out_dir.clone(),
        start: args.start,
        days: args.days,
        seed: args.seed,
        gain: args.gain,
        scale: args.scale,
        level: args.level,
        noise_sd: args.noise_sd,
        keep: args.keep,
    }
}
