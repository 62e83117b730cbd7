//! Sampling frequencies and equidistant time grids.
//!
//! Frequencies are written as an optional positive multiplier followed by a
//! unit: `D` (day), `H` (hour), `W` (week), `min` (minute), `S` (second).
//! Examples: `D`, `7D`, `6H`, `15min`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::{ModelError, ModelResult};

/// Upper bound on grid length; protects against typos such as `1S` over decades.
const MAX_GRID_LEN: usize = 10_000_000;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Elapsed time between two timestamps in (fractional) days.
pub fn elapsed_days(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / (SECONDS_PER_DAY * 1e6),
        None => delta.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    count: u32,
    unit: FreqUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FreqUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl FreqUnit {
    fn seconds(self) -> i64 {
        match self {
            FreqUnit::Second => 1,
            FreqUnit::Minute => 60,
            FreqUnit::Hour => 3_600,
            FreqUnit::Day => 86_400,
            FreqUnit::Week => 7 * 86_400,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            FreqUnit::Second => "S",
            FreqUnit::Minute => "min",
            FreqUnit::Hour => "H",
            FreqUnit::Day => "D",
            FreqUnit::Week => "W",
        }
    }
}

impl Frequency {
    pub const DAILY: Frequency = Frequency {
        count: 1,
        unit: FreqUnit::Day,
    };

    fn with_unit(count: u32, unit: FreqUnit) -> ModelResult<Self> {
        if count == 0 {
            return Err(ModelError::validation("frequency multiplier must be > 0"));
        }
        Ok(Self { count, unit })
    }

    pub fn step(self) -> TimeDelta {
        TimeDelta::seconds(self.unit.seconds() * i64::from(self.count))
    }

    /// Step length in days.
    pub fn step_days(self) -> f64 {
        (self.unit.seconds() * i64::from(self.count)) as f64 / SECONDS_PER_DAY
    }

    /// Equidistant grid `tmin, tmin + step, ...` up to and including `tmax`.
    pub fn date_range(self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> ModelResult<Vec<NaiveDateTime>> {
        if tmax < tmin {
            return Err(ModelError::validation(format!(
                "grid end {tmax} precedes grid start {tmin}"
            )));
        }
        let step = self.step();
        let span = (tmax - tmin).num_seconds() / step.num_seconds().max(1);
        let len = usize::try_from(span).unwrap_or(usize::MAX).saturating_add(1);
        if len > MAX_GRID_LEN {
            return Err(ModelError::validation(format!(
                "grid {tmin}..{tmax} at frequency {self} would hold {len} points"
            )));
        }

        let mut grid = Vec::with_capacity(len);
        let mut t = tmin;
        while t <= tmax {
            grid.push(t);
            t += step;
        }
        Ok(grid)
    }

    /// Like [`Frequency::date_range`], but extended by one step when `tmax`
    /// is not itself a grid point, so the grid brackets every time in the window.
    pub fn covering_range(self, tmin: NaiveDateTime, tmax: NaiveDateTime) -> ModelResult<Vec<NaiveDateTime>> {
        let mut grid = self.date_range(tmin, tmax)?;
        if let Some(&last) = grid.last() {
            if last < tmax {
                grid.push(last + self.step());
            }
        }
        Ok(grid)
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::DAILY
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{}", self.unit.suffix())
        } else {
            write!(f, "{}{}", self.count, self.unit.suffix())
        }
    }
}

impl FromStr for Frequency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|e| ModelError::validation(format!("invalid frequency `{s}`: {e}")))?
        };

        let unit = match unit {
            "S" | "s" => FreqUnit::Second,
            "min" | "T" => FreqUnit::Minute,
            "H" | "h" => FreqUnit::Hour,
            "D" | "d" => FreqUnit::Day,
            "W" | "w" => FreqUnit::Week,
            _ => {
                return Err(ModelError::validation(format!(
                    "invalid frequency `{s}`: expected a unit of S, min, H, D or W"
                )));
            }
        };

        Frequency::with_unit(count, unit)
    }
}
