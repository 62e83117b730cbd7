//! Timestamp-indexed scalar series.
//!
//! The index is strictly increasing. All elementwise operations align by
//! timestamp and refuse to combine series with different indices.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::series::grid::elapsed_days;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    index: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, validating lengths and index ordering.
    pub fn new(index: Vec<NaiveDateTime>, values: Vec<f64>) -> ModelResult<Self> {
        if index.len() != values.len() {
            return Err(ModelError::validation(format!(
                "series index has {} timestamps but {} values",
                index.len(),
                values.len()
            )));
        }
        if let Some(pos) = index.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ModelError::validation(format!(
                "series timestamps must be strictly increasing (violation at {})",
                index[pos + 1]
            )));
        }
        Ok(Self { index, values })
    }

    /// All-zero series over `index`.
    pub fn zeros(index: &[NaiveDateTime]) -> Self {
        Self {
            index: index.to_vec(),
            values: vec![0.0; index.len()],
        }
    }

    /// Constant series over `index`.
    pub fn constant(index: &[NaiveDateTime], value: f64) -> Self {
        Self {
            index: index.to_vec(),
            values: vec![value; index.len()],
        }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }

    /// Inclusive sub-series `[tmin, tmax]`.
    pub fn slice(&self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> TimeSeries {
        let (lo, hi) = self.bounds(tmin, tmax);
        TimeSeries {
            index: self.index[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// Index range of the inclusive window `[tmin, tmax]`.
    pub(crate) fn bounds(&self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> (usize, usize) {
        let lo = self.index.partition_point(|t| *t < tmin);
        let hi = self.index.partition_point(|t| *t <= tmax).max(lo);
        (lo, hi)
    }

    /// Linearly interpolated value at `t`; `None` outside the index extent.
    pub fn value_at(&self, t: NaiveDateTime) -> Option<f64> {
        match self.index.binary_search(&t) {
            Ok(i) => Some(self.values[i]),
            Err(i) => {
                if i == 0 || i >= self.index.len() {
                    return None;
                }
                let (t0, t1) = (self.index[i - 1], self.index[i]);
                let (y0, y1) = (self.values[i - 1], self.values[i]);
                let u = elapsed_days(t0, t) / elapsed_days(t0, t1);
                Some(y0 + u * (y1 - y0))
            }
        }
    }

    /// Evaluate this series at `times` (linear interpolation between samples).
    pub fn sample_at(&self, times: &[NaiveDateTime]) -> ModelResult<TimeSeries> {
        let mut values = Vec::with_capacity(times.len());
        for &t in times {
            let v = self.value_at(t).ok_or_else(|| {
                ModelError::validation(format!(
                    "timestamp {t} lies outside the series extent {}..{}",
                    fmt_opt_time(self.first_time()),
                    fmt_opt_time(self.last_time())
                ))
            })?;
            values.push(v);
        }
        TimeSeries::new(times.to_vec(), values)
    }

    /// Elementwise `self += other`; both must share the same index.
    pub fn add_aligned(&mut self, other: &TimeSeries) -> ModelResult<()> {
        self.ensure_aligned(other)?;
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += *b;
        }
        Ok(())
    }

    /// Elementwise `self - other`; both must share the same index.
    pub fn sub_aligned(&self, other: &TimeSeries) -> ModelResult<TimeSeries> {
        self.ensure_aligned(other)?;
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ok(TimeSeries {
            index: self.index.clone(),
            values,
        })
    }

    fn ensure_aligned(&self, other: &TimeSeries) -> ModelResult<()> {
        if self.index != other.index {
            return Err(ModelError::validation(format!(
                "series are not aligned ({} vs {} timestamps)",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

fn fmt_opt_time(t: Option<NaiveDateTime>) -> String {
    t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn rejects_unsorted_index() {
        let err = TimeSeries::new(vec![day(2), day(1)], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn slice_is_inclusive() {
        let s = TimeSeries::new(vec![day(1), day(2), day(3), day(4)], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let w = s.slice(day(2), day(3));
        assert_eq!(w.values(), &[2.0, 3.0]);
        assert!(s.slice(day(5), day(9)).is_empty());
    }

    #[test]
    fn value_at_interpolates_between_samples() {
        let s = TimeSeries::new(vec![day(1), day(3)], vec![0.0, 4.0]).unwrap();
        assert_eq!(s.value_at(day(1)), Some(0.0));
        assert!((s.value_at(day(2)).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(s.value_at(day(4)), None);
    }

    #[test]
    fn add_aligned_requires_same_index() {
        let mut a = TimeSeries::zeros(&[day(1), day(2)]);
        let b = TimeSeries::constant(&[day(1), day(2)], 1.5);
        a.add_aligned(&b).unwrap();
        assert_eq!(a.values(), &[1.5, 1.5]);

        let c = TimeSeries::constant(&[day(1)], 1.0);
        assert!(a.add_aligned(&c).is_err());
    }
}
