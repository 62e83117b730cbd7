//! Calibration window `[tmin, tmax]`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::series::ObservedSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct CalibrationWindow {
    tmin: NaiveDateTime,
    tmax: NaiveDateTime,
}

/// Unchecked wire form; deserialized windows go through `CalibrationWindow::new`.
#[derive(Deserialize)]
struct RawWindow {
    tmin: NaiveDateTime,
    tmax: NaiveDateTime,
}

impl TryFrom<RawWindow> for CalibrationWindow {
    type Error = ModelError;

    fn try_from(raw: RawWindow) -> ModelResult<Self> {
        Self::new(raw.tmin, raw.tmax)
    }
}

impl CalibrationWindow {
    pub fn new(tmin: NaiveDateTime, tmax: NaiveDateTime) -> ModelResult<Self> {
        if tmax <= tmin {
            return Err(ModelError::validation(format!(
                "tmax ({tmax}) must be later than tmin ({tmin})"
            )));
        }
        Ok(Self { tmin, tmax })
    }

    /// The whole observed record.
    ///
    /// A record with a single observation has no extent and fails with
    /// `Validation`; pass an explicit window instead.
    pub fn observed_extent(observed: &ObservedSeries) -> ModelResult<Self> {
        let (first, last) = observed.extent();
        Self::new(first, last)
    }

    /// Resolve optional bounds against the observed record.
    ///
    /// Missing bounds default to the observed extent. Explicit bounds must lie
    /// inside it, `tmax > tmin`, and at least one observation must fall in the
    /// window.
    pub fn resolve(
        observed: &ObservedSeries,
        tmin: Option<NaiveDateTime>,
        tmax: Option<NaiveDateTime>,
    ) -> ModelResult<Self> {
        let (first, last) = observed.extent();
        let inside = |t: NaiveDateTime| t >= first && t <= last;

        let tmin = match tmin {
            Some(t) if !inside(t) => {
                return Err(ModelError::validation(format!(
                    "tmin {t} is outside the observed record {first}..{last}"
                )));
            }
            Some(t) => t,
            None => first,
        };
        let tmax = match tmax {
            Some(t) if !inside(t) => {
                return Err(ModelError::validation(format!(
                    "tmax {t} is outside the observed record {first}..{last}"
                )));
            }
            Some(t) => t,
            None => last,
        };

        let window = Self::new(tmin, tmax)?;
        if observed.window(tmin, tmax).is_empty() {
            return Err(ModelError::validation(format!(
                "no observations between {tmin} and {tmax}"
            )));
        }
        Ok(window)
    }

    pub fn tmin(&self) -> NaiveDateTime {
        self.tmin
    }

    pub fn tmax(&self) -> NaiveDateTime {
        self.tmax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::FillPolicy;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn observed() -> ObservedSeries {
        ObservedSeries::from_raw(
            vec![day(1), day(2), day(10), day(11)],
            vec![1.0, 2.0, 3.0, 4.0],
            FillPolicy::Drop,
        )
        .unwrap()
    }

    #[test]
    fn defaults_to_observed_extent() {
        let w = CalibrationWindow::resolve(&observed(), None, None).unwrap();
        assert_eq!((w.tmin(), w.tmax()), (day(1), day(11)));
    }

    #[test]
    fn explicit_bounds_are_kept_exactly() {
        let w = CalibrationWindow::resolve(&observed(), Some(day(2)), Some(day(10))).unwrap();
        assert_eq!((w.tmin(), w.tmax()), (day(2), day(10)));
    }

    #[test]
    fn bounds_outside_record_fail() {
        let obs = observed();
        let before = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(matches!(
            CalibrationWindow::resolve(&obs, Some(before), None),
            Err(ModelError::Validation(_))
        ));
        assert!(matches!(
            CalibrationWindow::resolve(&obs, None, Some(day(12))),
            Err(ModelError::Validation(_))
        ));
    }

    #[test]
    fn inverted_or_empty_windows_fail() {
        let obs = observed();
        assert!(CalibrationWindow::resolve(&obs, Some(day(10)), Some(day(2))).is_err());
        assert!(CalibrationWindow::resolve(&obs, Some(day(2)), Some(day(2))).is_err());
        // Inside the record but between observations.
        assert!(CalibrationWindow::resolve(&obs, Some(day(3)), Some(day(9))).is_err());
    }

    #[test]
    fn deserialization_checks_ordering() {
        let w: CalibrationWindow =
            serde_json::from_str(r#"{"tmin":"2000-01-01T00:00:00","tmax":"2000-01-05T00:00:00"}"#).unwrap();
        assert_eq!((w.tmin(), w.tmax()), (day(1), day(5)));

        let inverted = serde_json::from_str::<CalibrationWindow>(
            r#"{"tmin":"2000-01-05T00:00:00","tmax":"2000-01-01T00:00:00"}"#,
        );
        assert!(inverted.unwrap_err().to_string().contains("must be later than"));
    }
}
