//! Seeded synthetic data: a daily stress series and irregular observations
//! produced by a known constant + stress-response model.
//!
//! The generator goes through the same engine as calibration, so a fit on its
//! output should recover `level`, `gain` and `scale` up to the added noise.

use chrono::{NaiveDateTime, TimeDelta};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Normal};
use tracing::debug;

use crate::domain::SyntheticConfig;
use crate::engine::{CalibrationWindow, Model};
use crate::error::AppError;
use crate::models::{Constant, StressModel};
use crate::series::{ObservedSeries, TimeSeries};

/// Probability of a stress event on a given day.
const EVENT_PROB: f64 = 0.3;
/// Mean event magnitude.
const EVENT_MEAN: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub stress: TimeSeries,
    /// Thinned, noisy observations.
    pub observed: TimeSeries,
    /// `[level, gain, scale]` used to generate `observed`.
    pub truth: [f64; 3],
}

pub fn generate(config: &SyntheticConfig) -> Result<SyntheticData, AppError> {
    if config.days < 2 {
        return Err(AppError::new(2, "Synthetic series needs at least 2 days."));
    }
    if !(config.keep > 0.0 && config.keep <= 1.0) {
        return Err(AppError::new(2, "`--keep` must be in (0, 1]."));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(AppError::new(2, "`--noise-sd` must be a finite, non-negative number."));
    }
    if !(config.gain.is_finite() && config.scale.is_finite() && config.scale > 0.0 && config.level.is_finite()) {
        return Err(AppError::new(2, "Invalid synthetic model parameters."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let events = Exp::new(1.0 / EVENT_MEAN)
        .map_err(|e| AppError::new(4, format!("Stress distribution error: {e}")))?;
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let start = config
        .start
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::new(2, "Invalid start date."))?;
    let index: Vec<NaiveDateTime> = (0..config.days)
        .map(|d| start + TimeDelta::days(d as i64))
        .collect();

    let stress_values: Vec<f64> = (0..config.days)
        .map(|_| {
            if rng.gen_bool(EVENT_PROB) {
                events.sample(&mut rng)
            } else {
                0.0
            }
        })
        .collect();
    let stress = TimeSeries::new(index.clone(), stress_values)?;

    let truth = [config.level, config.gain, config.scale];
    let clean = simulate_truth(&stress, &index, truth)?;

    let last = index.len() - 1;
    let mut obs_index = Vec::new();
    let mut obs_values = Vec::new();
    for (i, (t, v)) in clean.iter().enumerate() {
        if i == 0 || i == last || rng.gen_bool(config.keep) {
            obs_index.push(t);
            obs_values.push(v + noise.sample(&mut rng));
        }
    }
    debug!(days = config.days, kept = obs_index.len(), "synthetic observations generated");

    Ok(SyntheticData {
        stress,
        observed: TimeSeries::new(obs_index, obs_values)?,
        truth,
    })
}

fn simulate_truth(stress: &TimeSeries, index: &[NaiveDateTime], truth: [f64; 3]) -> Result<TimeSeries, AppError> {
    let mut model = Model::new(ObservedSeries::from_series(TimeSeries::zeros(index))?).with_name("synthetic");
    model.add_component(Box::new(Constant::new("level", truth[0])))?;
    model.add_component(Box::new(StressModel::new("stress", stress.clone())?))?;
    let window = CalibrationWindow::new(index[0], index[index.len() - 1])?;
    Ok(model.simulate(Some(&truth), Some(window))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(seed: u64) -> SyntheticConfig {
        SyntheticConfig {
            out_dir: std::env::temp_dir(),
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            days: 200,
            seed,
            gain: 0.8,
            scale: 20.0,
            level: 3.0,
            noise_sd: 0.0,
            keep: 0.5,
        }
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(&config(7)).unwrap();
        let b = generate(&config(7)).unwrap();
        assert_eq!(a.stress, b.stress);
        assert_eq!(a.observed, b.observed);

        let c = generate(&config(8)).unwrap();
        assert_ne!(a.stress, c.stress);
    }

    #[test]
    fn thinning_keeps_endpoints() {
        let data = generate(&config(1)).unwrap();
        let obs = &data.observed;
        assert_eq!(obs.first_time(), data.stress.first_time());
        assert_eq!(obs.last_time(), data.stress.last_time());
        assert!(obs.len() < data.stress.len());
        assert!(obs.len() > 2);
    }

    #[test]
    fn noiseless_observations_match_the_model() {
        let data = generate(&config(3)).unwrap();
        // The first day only sees its own stress through the first block value.
        let first = data.observed.values()[0];
        let b0 = crate::models::response::block(0.8, 20.0, 1.0)[0];
        assert!((first - (3.0 + b0 * data.stress.values()[0])).abs() < 1e-12);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut c = config(1);
        c.keep = 0.0;
        assert_eq!(generate(&c).unwrap_err().exit_code(), 2);
        let mut c = config(1);
        c.days = 1;
        assert_eq!(generate(&c).unwrap_err().exit_code(), 2);
    }
}
