//! Exports: fit files (JSON) and aligned series tables (CSV).
//!
//! The CSV export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::FitFile;
use crate::error::AppError;

/// Write a fit file as pretty-printed JSON.
pub fn write_fit_json(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fit)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON '{}': {e}", path.display())))
}

pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Failed to parse fit JSON '{}': {e}", path.display())))
}

/// Write `time,<col>...` rows; every column must be aligned with `index`.
pub fn write_series_csv(path: &Path, index: &[NaiveDateTime], columns: &[(&str, &[f64])]) -> Result<(), AppError> {
    if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != index.len()) {
        return Err(AppError::new(
            4,
            format!(
                "Column `{name}` has {} values but the index has {}.",
                values.len(),
                index.len()
            ),
        ));
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let mut header = vec!["time".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.to_string()));
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for (i, t) in index.iter().enumerate() {
        let mut record = vec![t.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(columns.iter().map(|(_, values)| format!("{:.10}", values[i])));
        writer
            .write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CalibrationWindow, ParameterRow};
    use crate::io::ingest::{load_series_csv, parse_datetime};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tsfit-{}-{name}", std::process::id()))
    }

    #[test]
    fn fit_file_survives_disk() {
        let t0 = parse_datetime("2020-01-01").unwrap();
        let t1 = parse_datetime("2020-03-01").unwrap();
        let mut row = ParameterRow::new("rain", "A", 1.0).bounded(Some(0.0), None);
        row.optimal = Some(2.5);
        let fit = FitFile {
            model: "demo".to_string(),
            solver: "levenberg-marquardt".to_string(),
            window: CalibrationWindow::new(t0, t1).unwrap(),
            noise: true,
            sse: Some(0.25),
            converged: true,
            iterations: 12,
            parameters: vec![row],
            stderr: vec![Some(0.1)],
        };

        let path = temp_path("fit.json");
        write_fit_json(&path, &fit).unwrap();
        let back = read_fit_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, fit);
    }

    #[test]
    fn fit_file_without_finite_sse_reads_back() {
        let t0 = parse_datetime("2020-01-01").unwrap();
        let t1 = parse_datetime("2020-01-10").unwrap();
        let fit = FitFile {
            model: "unstable".to_string(),
            solver: "levenberg-marquardt".to_string(),
            window: CalibrationWindow::new(t0, t1).unwrap(),
            noise: false,
            sse: None,
            converged: false,
            iterations: 0,
            parameters: vec![ParameterRow::new("c", "d", 0.0)],
            stderr: vec![None],
        };

        let path = temp_path("nan-fit.json");
        write_fit_json(&path, &fit).unwrap();
        let back = read_fit_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.sse, None);
    }

    #[test]
    fn fit_file_with_inverted_window_is_rejected() {
        let path = temp_path("inverted-fit.json");
        let json = r#"{"model":"m","solver":"s",
            "window":{"tmin":"2020-02-01T00:00:00","tmax":"2020-01-01T00:00:00"},
            "noise":false,"sse":1.0,"converged":true,"iterations":1,
            "parameters":[],"stderr":[]}"#;
        std::fs::write(&path, json).unwrap();
        let err = read_fit_json(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn series_csv_is_readable_by_ingest() {
        let index = vec![
            parse_datetime("2020-01-01").unwrap(),
            parse_datetime("2020-01-02 12:00").unwrap(),
        ];
        let path = temp_path("series.csv");
        write_series_csv(&path, &index, &[("observed", &[1.0, 2.0]), ("residual", &[0.5, -0.5])]).unwrap();

        let data = load_series_csv(&path, Some("residual")).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(data.index, index);
        assert_eq!(data.values, vec![0.5, -0.5]);
    }

    #[test]
    fn misaligned_columns_are_rejected() {
        let index = vec![parse_datetime("2020-01-01").unwrap()];
        let err = write_series_csv(&temp_path("bad.csv"), &index, &[("x", &[1.0, 2.0])]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
