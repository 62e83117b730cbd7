//! Shared run configuration and export schema.
//!
//! These types are plain data so they can be:
//!
//! - built from CLI arguments
//! - exported to JSON after a fit
//! - reloaded later to warm-start a new calibration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::engine::{CalibrationWindow, ParameterRow};
use crate::series::{FillPolicy, Frequency};

/// One `--stress NAME=CSV` (or `--decreasing-stress NAME=CSV`) argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressSpec {
    pub name: String,
    pub path: PathBuf,
    /// Constrain the gain to be non-positive (e.g. evaporation).
    pub decreasing: bool,
}

impl FromStr for StressSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=CSV, got `{s}`"))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() || path.is_empty() {
            return Err(format!("expected NAME=CSV, got `{s}`"));
        }
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            decreasing: false,
        })
    }
}

impl fmt::Display for StressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.path.display())
    }
}

/// Resolved settings for `tsfit fit`.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub obs_path: PathBuf,
    /// Value column; defaults to the first non-time column.
    pub obs_column: Option<String>,
    pub stresses: Vec<StressSpec>,
    pub fill: FillPolicy,
    pub freq: Frequency,
    pub tmin: Option<NaiveDateTime>,
    pub tmax: Option<NaiveDateTime>,
    pub noise: bool,
    /// Initial decay time (days) of the exponential noise model.
    pub noise_alpha: f64,
    pub continue_from: Option<PathBuf>,
    pub max_iter: usize,
    pub tol_cost: f64,
    pub tol_grad: f64,
    pub export_fit: Option<PathBuf>,
    pub export_series: Option<PathBuf>,
    pub report: bool,
}

/// Resolved settings for `tsfit synth`.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub out_dir: PathBuf,
    pub start: NaiveDate,
    pub days: usize,
    pub seed: u64,
    pub gain: f64,
    pub scale: f64,
    pub level: f64,
    /// Standard deviation of the additive observation noise.
    pub noise_sd: f64,
    /// Probability of keeping each daily observation.
    pub keep: f64,
}

/// JSON fit file written by `--export-fit` and read by `--continue-from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub model: String,
    pub solver: String,
    pub window: CalibrationWindow,
    pub noise: bool,
    /// `None` when the objective was not finite (JSON has no NaN).
    pub sse: Option<f64>,
    pub converged: bool,
    pub iterations: usize,
    pub parameters: Vec<ParameterRow>,
    pub stderr: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stress_spec_parses_name_and_path() {
        let spec: StressSpec = "rain=data/rain.csv".parse().unwrap();
        assert_eq!(spec.name, "rain");
        assert_eq!(spec.path, PathBuf::from("data/rain.csv"));
        assert_eq!(spec.to_string(), "rain=data/rain.csv");
        assert!(!spec.decreasing);
    }

    #[test]
    fn stress_spec_rejects_missing_parts() {
        assert!("rain".parse::<StressSpec>().is_err());
        assert!("=x.csv".parse::<StressSpec>().is_err());
        assert!("rain=".parse::<StressSpec>().is_err());
    }
}
