//! CSV ingest of timestamped scalar series.
//!
//! Expected layout: a header row, one time column (`time`, `date`,
//! `datetime` or `timestamp`; otherwise the first column) and one or more
//! numeric columns. Empty cells and `nan`/`na` are read as missing (NaN);
//! the observed-series fill policy decides what happens to them.
//!
//! Design goals:
//! - **Strict schema** for the time and value columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no model logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::error::AppError;

const TIME_COLUMNS: [&str; 4] = ["time", "date", "datetime", "timestamp"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Raw series as read from disk, sorted by time.
#[derive(Debug, Clone)]
pub struct SeriesData {
    pub column: String,
    pub index: Vec<NaiveDateTime>,
    /// NaN marks a missing value.
    pub values: Vec<f64>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl SeriesData {
    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}

/// Load one value column from a CSV file.
pub fn load_series_csv(path: &Path, column: Option<&str>) -> Result<SeriesData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_series(file, column).map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Parse a series from any reader (used by `load_series_csv` and tests).
pub fn read_series<R: Read>(reader: R, column: Option<&str>) -> Result<SeriesData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = TIME_COLUMNS
        .iter()
        .find_map(|name| header_map.get(*name).copied())
        .unwrap_or(0);
    let (value_idx, column) = resolve_value_column(&headers, &header_map, time_idx, column)?;

    let mut rows: Vec<(NaiveDateTime, f64, usize)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, time_idx, value_idx) {
            Ok((t, v)) => rows.push((t, v, line)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|(t, _, _)| *t);
    let mut index = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());
    for (t, v, line) in rows {
        if index.last() == Some(&t) {
            row_errors.push(RowError {
                line,
                message: format!("Duplicate timestamp {t}; keeping the first occurrence."),
            });
            continue;
        }
        index.push(t);
        values.push(v);
    }

    if index.is_empty() {
        return Err(AppError::new(3, format!("No valid rows in column `{column}`.")));
    }

    Ok(SeriesData {
        column,
        index,
        values,
        row_errors,
        rows_read,
    })
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and the `T`-separated forms.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_value_column(
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
    time_idx: usize,
    requested: Option<&str>,
) -> Result<(usize, String), AppError> {
    if let Some(name) = requested {
        let idx = header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing requested value column: `{name}`")))?;
        return Ok((idx, name.to_string()));
    }

    (0..headers.len())
        .find(|&i| i != time_idx)
        .map(|i| (i, headers.get(i).map(normalize_header_name).unwrap_or_default()))
        .ok_or_else(|| AppError::new(2, "CSV needs a time column and at least one value column."))
}

fn parse_row(record: &StringRecord, time_idx: usize, value_idx: usize) -> Result<(NaiveDateTime, f64), String> {
    let raw_time = record
        .get(time_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing timestamp.".to_string())?;
    let t = parse_datetime(raw_time).ok_or_else(|| format!("Invalid timestamp `{raw_time}`."))?;

    let raw_value = record.get(value_idx).unwrap_or("");
    let v = parse_value(raw_value).ok_or_else(|| format!("Invalid value `{raw_value}`."))?;
    Ok((t, v))
}

/// `None` for garbage; `Some(NaN)` for an explicitly missing cell.
fn parse_value(s: &str) -> Option<f64> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "nan" | "na" | "null" => Some(f64::NAN),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn reads_named_columns_and_marks_missing() {
        let csv = "\u{feff}Date,head,rain\n2020-01-01,1.5,0\n2020-01-02,,1\n2020-01-03,2.5,2\n";
        let data = read_series(csv.as_bytes(), Some("head")).unwrap();
        assert_eq!(data.index, vec![dt("2020-01-01"), dt("2020-01-02"), dt("2020-01-03")]);
        assert_eq!(data.values[0], 1.5);
        assert!(data.values[1].is_nan());
        assert_eq!(data.missing(), 1);
        assert_eq!(data.rows_read, 3);
        assert!(data.row_errors.is_empty());
    }

    #[test]
    fn defaults_to_first_value_column() {
        let csv = "value,time\n3.0,2020-01-02 06:00:00\n4.0,2020-01-01T12:00:00\n";
        let data = read_series(csv.as_bytes(), None).unwrap();
        assert_eq!(data.column, "value");
        // Sorted by time.
        assert_eq!(data.values, vec![4.0, 3.0]);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "time,h\n2020-01-01,1\nnot-a-date,2\n2020-01-03,abc\n2020-01-01,9\n";
        let data = read_series(csv.as_bytes(), None).unwrap();
        assert_eq!(data.values, vec![1.0]);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn missing_requested_column_is_input_error() {
        let err = read_series("time,h\n2020-01-01,1\n".as_bytes(), Some("q")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_series_is_no_data_error() {
        let err = read_series("time,h\n".as_bytes(), None).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
