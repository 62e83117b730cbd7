//! Command-line parsing for the transfer-function model calibrator.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling code: arguments are turned into `FitConfig` / `SyntheticConfig`
//! by `app`, and nothing below `app` sees clap types.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};

use crate::domain::StressSpec;
use crate::io::parse_datetime;
use crate::series::{FillPolicy, Frequency};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tsfit", version, about = "Transfer-function time series model calibration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate a constant + stress-response model against an observed series.
    Fit(FitArgs),
    /// Write a seeded synthetic stress/observation pair to CSV.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Observed series CSV (time column + value column).
    #[arg(long, value_name = "CSV")]
    pub obs: PathBuf,

    /// Value column in the observation CSV (default: first non-time column).
    #[arg(long)]
    pub obs_column: Option<String>,

    /// Stress input as NAME=CSV; repeat for several stresses.
    #[arg(long = "stress", value_name = "NAME=CSV")]
    pub stresses: Vec<StressSpec>,

    /// Stress whose gain is constrained to be non-positive (e.g. evaporation), as NAME=CSV.
    #[arg(long = "decreasing-stress", value_name = "NAME=CSV")]
    pub decreasing_stresses: Vec<StressSpec>,

    /// Missing-value policy: drop, interpolate, mean, or a constant.
    #[arg(long, default_value = "drop")]
    pub fill: FillPolicy,

    /// Simulation grid frequency (e.g. D, 7D, 6H).
    #[arg(long, default_value = "D")]
    pub freq: Frequency,

    /// Start of the calibration window (default: first observation).
    #[arg(long, value_parser = parse_cli_datetime)]
    pub tmin: Option<NaiveDateTime>,

    /// End of the calibration window (default: last observation).
    #[arg(long, value_parser = parse_cli_datetime)]
    pub tmax: Option<NaiveDateTime>,

    /// Calibrate on noise-model innovations (exponential decay noise model).
    #[arg(long)]
    pub noise: bool,

    /// Initial noise decay time in days.
    #[arg(long, default_value_t = 14.0)]
    pub noise_alpha: f64,

    /// Warm-start from a fit JSON written by `--export-fit`.
    #[arg(long, value_name = "JSON")]
    pub continue_from: Option<PathBuf>,

    /// Maximum solver iterations.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Relative cost-reduction tolerance.
    #[arg(long, default_value_t = 1e-12)]
    pub tol_cost: f64,

    /// Gradient tolerance.
    #[arg(long, default_value_t = 1e-12)]
    pub tol_grad: f64,

    /// Export the fitted parameter table to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Export observed / simulated / residual series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_series: Option<PathBuf>,

    /// Do not print the calibration report.
    #[arg(long)]
    pub no_report: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output directory for `stress.csv` and `observations.csv`.
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// First day of the synthetic record.
    #[arg(long, default_value = "2000-01-01")]
    pub start: NaiveDate,

    /// Length of the daily stress series.
    #[arg(long, default_value_t = 730)]
    pub days: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Stress response gain.
    #[arg(long, default_value_t = 0.5)]
    pub gain: f64,

    /// Stress response time scale in days.
    #[arg(long, default_value_t = 30.0)]
    pub scale: f64,

    /// Constant level.
    #[arg(long, default_value_t = 10.0)]
    pub level: f64,

    /// Standard deviation of the observation noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise_sd: f64,

    /// Probability of keeping each daily observation.
    #[arg(long, default_value_t = 0.3)]
    pub keep: f64,
}

fn parse_cli_datetime(s: &str) -> Result<NaiveDateTime, String> {
    parse_datetime(s).ok_or_else(|| format!("invalid timestamp `{s}` (expected YYYY-MM-DD[ HH:MM[:SS]])"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_arguments_parse() {
        let cli = Cli::try_parse_from([
            "tsfit",
            "fit",
            "--obs",
            "head.csv",
            "--stress",
            "rain=rain.csv",
            "--decreasing-stress",
            "evap=evap.csv",
            "--fill",
            "interpolate",
            "--freq",
            "7D",
            "--tmin",
            "2001-01-01",
            "--noise",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.stresses.len(), 1);
        assert_eq!(args.decreasing_stresses[0].name, "evap");
        assert_eq!(args.fill, FillPolicy::Interpolate);
        assert_eq!(args.freq, "7D".parse::<Frequency>().unwrap());
        assert_eq!(args.tmin, parse_datetime("2001-01-01"));
        assert!(args.noise);
        assert!(!args.no_report);
    }

    #[test]
    fn invalid_fill_is_rejected() {
        assert!(Cli::try_parse_from(["tsfit", "fit", "--obs", "h.csv", "--fill", "sideways"]).is_err());
    }

    #[test]
    fn synth_defaults() {
        let cli = Cli::try_parse_from(["tsfit", "synth", "--out-dir", "out"]).unwrap();
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.days, 730);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }
}
