//! Formatted terminal output: fit reports and parameter tables.
//!
//! We keep formatting code in one place so:
//! - the engine and solver code stays clean and testable
//! - output changes are localized

use crate::engine::{CalibrationWindow, ParameterTable};
use crate::error::ModelWarning;

/// Run-level facts printed above the parameter table.
#[derive(Debug, Clone)]
pub struct FitSummary<'a> {
    pub model: &'a str,
    pub solver: &'a str,
    pub window: CalibrationWindow,
    pub noise: bool,
    pub nobs: usize,
    pub sse: f64,
    pub converged: bool,
    pub message: &'a str,
    pub iterations: usize,
    pub nfev: usize,
}

/// Full calibration report: summary block plus the parameter table.
pub fn format_fit_report(
    table: &ParameterTable,
    optimal: &[f64],
    stderr: &[Option<f64>],
    summary: &FitSummary<'_>,
) -> String {
    let mut out = String::new();

    out.push_str("=== tsfit - calibration report ===\n");
    out.push_str(&format!("Model: {}\n", summary.model));
    out.push_str(&format!(
        "Solver: {} | converged={} ({})\n",
        summary.solver,
        if summary.converged { "yes" } else { "no" },
        summary.message
    ));
    out.push_str(&format!(
        "Window: {} .. {} | noise={}\n",
        summary.window.tmin(),
        summary.window.tmax(),
        if summary.noise { "on" } else { "off" }
    ));
    let rmse = if summary.nobs > 0 {
        (summary.sse / summary.nobs as f64).sqrt()
    } else {
        f64::NAN
    };
    out.push_str(&format!(
        "Fit: n={} | SSE={:.6} RMSE={:.6} | iterations={} nfev={}\n",
        summary.nobs, summary.sse, rmse, summary.iterations, summary.nfev
    ));

    out.push('\n');
    out.push_str(&format_rows(table, Some(optimal), Some(stderr)));
    out
}

pub fn format_warnings(warnings: &[ModelWarning]) -> String {
    let mut out = String::new();
    for w in warnings {
        out.push_str(&format!("warning: {w}\n"));
    }
    out
}

fn format_rows(table: &ParameterTable, optimal: Option<&[f64]>, stderr: Option<&[Option<f64>]>) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>12} {:>12} {:>10} {:>10} {:>10} {:<5}",
            "name", "initial", "optimal", "stderr", "pmin", "pmax", "vary"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<12} {:-<12} {:-<10} {:-<10} {:-<10} {:-<5}",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (i, row) in table.rows().iter().enumerate() {
        let opt = optimal.and_then(|o| o.get(i).copied());
        let se = stderr.and_then(|s| s.get(i).copied().flatten());
        out.push_str(
            format!(
                "{:<20} {:>12} {:>12} {:>10} {:>10} {:>10} {:<5}",
                truncate(&row.name, 20),
                fmt_num(Some(row.initial), 6),
                fmt_num(opt, 6),
                fmt_num(se, 4),
                fmt_num(row.pmin, 2),
                fmt_num(row.pmax, 2),
                row.vary,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_num(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ComponentRegistry;
    use crate::models::Constant;
    use chrono::NaiveDate;

    fn table() -> ParameterTable {
        let mut reg = ComponentRegistry::new();
        reg.add(Box::new(Constant::new("level", 1.0))).unwrap();
        ParameterTable::build(&reg, None).unwrap()
    }

    #[test]
    fn parameter_table_marks_missing_values() {
        let text = format_rows(&table(), None, None);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name"));
        assert!(lines[2].starts_with("level_d"));
        assert!(lines[2].contains("1.000000"));
        assert!(lines[2].contains(" - "));
    }

    #[test]
    fn fit_report_lists_summary_and_optimum() {
        let t = table();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let window = CalibrationWindow::new(start, start + chrono::TimeDelta::days(9)).unwrap();
        let summary = FitSummary {
            model: "demo",
            solver: "levenberg-marquardt",
            window,
            noise: false,
            nobs: 10,
            sse: 0.0,
            converged: true,
            message: "cost reduction below tolerance",
            iterations: 3,
            nfev: 7,
        };
        let text = format_fit_report(&t, &[5.0], &[Some(0.01)], &summary);
        assert!(text.contains("Model: demo"));
        assert!(text.contains("converged=yes"));
        assert!(text.contains("noise=off"));
        assert!(text.contains("5.000000"));
        assert!(text.contains("0.0100"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
