//! Observed (dependent) series and its cleaning policy.
//!
//! An `ObservedSeries` is built once from raw samples and never mutated:
//!
//! - missing values (NaN) are handled by a `FillPolicy`
//! - timestamps must be strictly increasing (gaps are allowed)
//! - elapsed-day gaps between consecutive samples are computed up front; the
//!   first gap is NaN because it has no predecessor

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::error::{ModelError, ModelResult};
use crate::series::grid::elapsed_days;
use crate::series::timeseries::TimeSeries;

/// How missing observations are treated.
///
/// Parses from `drop`, `interpolate`, `mean`, or a float literal (constant fill).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FillPolicy {
    #[default]
    Drop,
    /// Linear (time-weighted) interpolation between the nearest valid samples.
    /// Leading and trailing gaps cannot be interpolated and are dropped.
    Interpolate,
    Constant(f64),
    Mean,
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillPolicy::Drop => write!(f, "drop"),
            FillPolicy::Interpolate => write!(f, "interpolate"),
            FillPolicy::Constant(v) => write!(f, "{v}"),
            FillPolicy::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for FillPolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(FillPolicy::Drop),
            "interpolate" => Ok(FillPolicy::Interpolate),
            "mean" => Ok(FillPolicy::Mean),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FillPolicy::Constant)
                .ok_or_else(|| {
                    ModelError::validation(format!(
                        "invalid fill policy `{s}`: expected drop, interpolate, mean or a number"
                    ))
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSeries {
    series: TimeSeries,
    gaps: Vec<f64>,
}

impl ObservedSeries {
    /// Clean raw samples (NaN = missing) and build the observed series.
    pub fn from_raw(index: Vec<NaiveDateTime>, values: Vec<f64>, fill: FillPolicy) -> ModelResult<Self> {
        let raw = TimeSeries::new(index, values)?;
        let (index, values) = apply_fill(&raw, fill);
        if index.is_empty() {
            return Err(ModelError::validation(
                "observed series is empty after cleaning",
            ));
        }
        Self::from_series(TimeSeries::new(index, values)?)
    }

    /// Wrap an already clean series (no NaN allowed).
    pub fn from_series(series: TimeSeries) -> ModelResult<Self> {
        if series.is_empty() {
            return Err(ModelError::validation("observed series is empty"));
        }
        if let Some((t, _)) = series.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::validation(format!(
                "observed series holds a non-finite value at {t}"
            )));
        }

        let mut gaps = Vec::with_capacity(series.len());
        gaps.push(f64::NAN);
        gaps.extend(series.index().windows(2).map(|w| elapsed_days(w[0], w[1])));

        Ok(Self { series, gaps })
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Elapsed days since the previous observation (first entry NaN).
    pub fn gaps(&self) -> &[f64] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// First and last observation timestamps.
    pub fn extent(&self) -> (NaiveDateTime, NaiveDateTime) {
        let index = self.series.index();
        // Non-empty by construction.
        (index[0], index[index.len() - 1])
    }

    /// Observations inside the inclusive window.
    pub fn window(&self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> TimeSeries {
        self.series.slice(tmin, tmax)
    }

    /// Gaps restricted to the inclusive window, aligned with [`ObservedSeries::window`].
    pub fn gaps_in(&self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> &[f64] {
        let (lo, hi) = self.series.bounds(tmin, tmax);
        &self.gaps[lo..hi]
    }

    pub fn mean(&self) -> f64 {
        self.series.mean().unwrap_or(0.0)
    }
}

fn apply_fill(raw: &TimeSeries, fill: FillPolicy) -> (Vec<NaiveDateTime>, Vec<f64>) {
    let index = raw.index();
    let values = raw.values();
    let valid: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();

    match fill {
        FillPolicy::Drop => (
            valid.iter().map(|&i| index[i]).collect(),
            valid.iter().map(|&i| values[i]).collect(),
        ),
        FillPolicy::Constant(c) => (
            index.to_vec(),
            values.iter().map(|&v| if v.is_finite() { v } else { c }).collect(),
        ),
        FillPolicy::Mean => {
            if valid.is_empty() {
                return (Vec::new(), Vec::new());
            }
            let mean = valid.iter().map(|&i| values[i]).sum::<f64>() / valid.len() as f64;
            (
                index.to_vec(),
                values.iter().map(|&v| if v.is_finite() { v } else { mean }).collect(),
            )
        }
        FillPolicy::Interpolate => {
            let (Some(&first), Some(&last)) = (valid.first(), valid.last()) else {
                return (Vec::new(), Vec::new());
            };
            let mut out_index = Vec::with_capacity(last - first + 1);
            let mut out_values = Vec::with_capacity(last - first + 1);
            let mut prev = first;
            for i in first..=last {
                let v = if values[i].is_finite() {
                    prev = i;
                    values[i]
                } else {
                    // Next valid sample exists because `last` is valid.
                    let next = valid[valid.partition_point(|&j| j < i)];
                    let u = elapsed_days(index[prev], index[i]) / elapsed_days(index[prev], index[next]);
                    values[prev] + u * (values[next] - values[prev])
                };
                out_index.push(index[i]);
                out_values.push(v);
            }
            (out_index, out_values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 6, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn raw() -> (Vec<NaiveDateTime>, Vec<f64>) {
        (
            vec![day(1), day(2), day(4), day(5), day(6)],
            vec![f64::NAN, 1.0, f64::NAN, 4.0, f64::NAN],
        )
    }

    #[test]
    fn fill_policy_parses_keywords_and_numbers() {
        assert_eq!("drop".parse::<FillPolicy>().unwrap(), FillPolicy::Drop);
        assert_eq!("Interpolate".parse::<FillPolicy>().unwrap(), FillPolicy::Interpolate);
        assert_eq!("mean".parse::<FillPolicy>().unwrap(), FillPolicy::Mean);
        assert_eq!("-2.5".parse::<FillPolicy>().unwrap(), FillPolicy::Constant(-2.5));
        assert!("nan".parse::<FillPolicy>().is_err());
        assert!("sometimes".parse::<FillPolicy>().is_err());
    }

    #[test]
    fn drop_removes_missing_samples() {
        let (i, v) = raw();
        let obs = ObservedSeries::from_raw(i, v, FillPolicy::Drop).unwrap();
        assert_eq!(obs.series().values(), &[1.0, 4.0]);
        assert!(obs.gaps()[0].is_nan());
        assert!((obs.gaps()[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn interpolate_is_time_weighted_and_trims_edges() {
        let (i, v) = raw();
        let obs = ObservedSeries::from_raw(i, v, FillPolicy::Interpolate).unwrap();
        assert_eq!(obs.series().index(), &[day(2), day(4), day(5)]);
        // day 4 lies 2/3 of the way from day 2 to day 5.
        assert!((obs.series().values()[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_and_mean_fill_every_gap() {
        let (i, v) = raw();
        let obs = ObservedSeries::from_raw(i.clone(), v.clone(), FillPolicy::Constant(0.5)).unwrap();
        assert_eq!(obs.series().values(), &[0.5, 1.0, 0.5, 4.0, 0.5]);

        let obs = ObservedSeries::from_raw(i, v, FillPolicy::Mean).unwrap();
        assert_eq!(obs.series().values(), &[2.5, 1.0, 2.5, 4.0, 2.5]);
    }

    #[test]
    fn all_missing_is_rejected() {
        let err = ObservedSeries::from_raw(vec![day(1), day(2)], vec![f64::NAN, f64::NAN], FillPolicy::Drop)
            .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn gaps_in_window_align_with_window() {
        let obs = ObservedSeries::from_raw(
            vec![day(1), day(2), day(4), day(8)],
            vec![1.0, 2.0, 3.0, 4.0],
            FillPolicy::Drop,
        )
        .unwrap();
        let w = obs.window(day(2), day(4));
        let g = obs.gaps_in(day(2), day(4));
        assert_eq!(w.len(), g.len());
        assert_eq!(g, &[1.0, 2.0]);
    }
}
