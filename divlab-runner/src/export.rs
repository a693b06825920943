//! Report export: one CSV row per analysis record, optional JSON.

use anyhow::{bail, Context, Result};
use divlab_core::analysis::WindowResult;
use divlab_core::domain::{EventDateKind, Symbol};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::{AnalysisOutcome, AnalysisRecord};

const WINDOW_DATE_FORMAT: &str = "%Y/%m/%d";
const PERIOD_FORMAT: &str = "%Y-%m-%d";

pub fn report_file_name(symbol: &str) -> String {
    format!("dividend_analysis_result_{symbol}.csv")
}

/// Column names, in output order.
pub fn csv_header() -> Vec<String> {
    let mut header: Vec<String> = [
        "report_period",
        "cash_per_share",
        "yield_pct",
        "prior_year_high",
        "prior_year_high_date",
        "prior_year_low",
        "prior_year_low_date",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for kind in EventDateKind::ALL {
        let label = kind.label();
        header.push(label.to_string());
        for suffix in ["high", "high_date", "low", "low_date"] {
            header.push(format!("{label}_{suffix}"));
        }
    }
    header
}

fn num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn window_cells(w: &WindowResult) -> [String; 4] {
    [
        w.high.to_string(),
        w.high_date.format(WINDOW_DATE_FORMAT).to_string(),
        w.low.to_string(),
        w.low_date.format(WINDOW_DATE_FORMAT).to_string(),
    ]
}

/// One CSV row; absent values are empty cells.
pub fn record_to_row(record: &AnalysisRecord) -> Vec<String> {
    let mut row = vec![
        record.report_period.format(PERIOD_FORMAT).to_string(),
        num(record.cash_per_share),
        num(record.yield_pct),
    ];
    row.extend(window_cells(&record.prior_year));

    for kind in EventDateKind::ALL {
        match record.window(kind) {
            Some(w) => {
                row.push(w.target_date.format(WINDOW_DATE_FORMAT).to_string());
                row.extend(window_cells(w));
            }
            None => row.extend(std::iter::repeat(String::new()).take(5)),
        }
    }
    row
}

pub fn write_csv<W: Write>(writer: W, records: &[AnalysisRecord]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(csv_header())?;
    for record in records {
        out.write_record(record_to_row(record))?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_json(outcome: &AnalysisOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("Failed to serialize analysis outcome")
}

/// Write the CSV report (and, if asked, a JSON report) under `output_dir`.
/// Returns the paths written; an outcome without records writes nothing.
pub fn save_report(
    output_dir: impl AsRef<Path>,
    outcome: &AnalysisOutcome,
    include_json: bool,
) -> Result<Vec<PathBuf>> {
    if !Symbol::parse(&outcome.symbol).is_file_safe() {
        bail!("symbol '{}' cannot be used in a report file name", outcome.symbol);
    }
    if outcome.records.is_empty() {
        tracing::info!(symbol = %outcome.symbol, "no analysable data, report not written");
        return Ok(Vec::new());
    }

    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let csv_path = output_dir.join(report_file_name(&outcome.symbol));
    let file = std::fs::File::create(&csv_path)
        .with_context(|| format!("Failed to create report {}", csv_path.display()))?;
    write_csv(file, &outcome.records)
        .with_context(|| format!("Failed to write report {}", csv_path.display()))?;
    let mut paths = vec![csv_path];

    if include_json {
        let json_path = paths[0].with_extension("json");
        std::fs::write(&json_path, to_json(outcome)?)
            .with_context(|| format!("Failed to write report {}", json_path.display()))?;
        paths.push(json_path);
    }

    tracing::info!(
        symbol = %outcome.symbol,
        records = outcome.records.len(),
        path = %paths[0].display(),
        "saved report"
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(target: NaiveDate) -> WindowResult {
        WindowResult {
            target_date: target,
            high: 7.4,
            high_date: d(2023, 5, 20),
            low: 6.9,
            low_date: d(2023, 6, 10),
        }
    }

    fn record() -> AnalysisRecord {
        let mut windows = BTreeMap::new();
        windows.insert(EventDateKind::Record, window(d(2023, 6, 1)));
        AnalysisRecord {
            report_period: d(2023, 4, 20),
            cash_per_share: Some(0.35),
            yield_pct: None,
            prior_year: window(d(2023, 4, 20)),
            windows,
        }
    }

    #[test]
    fn header_has_one_block_per_event_date() {
        let header = csv_header();
        assert_eq!(header.len(), 7 + 3 * 5);
        assert_eq!(header[7], "announce_date");
        assert_eq!(header[12], "record_date");
        assert_eq!(header[21], "ex_date_low_date");
    }

    #[test]
    fn absent_values_are_empty_cells() {
        let row = record_to_row(&record());
        assert_eq!(row.len(), csv_header().len());
        assert_eq!(row[0], "2023-04-20");
        assert_eq!(row[1], "0.35");
        assert_eq!(row[2], "");
        assert_eq!(row[4], "2023/05/20");
        assert!(row[7..12].iter().all(String::is_empty));
        assert_eq!(row[12], "2023/06/01");
        assert_eq!(row[13], "7.4");
        assert!(row[17..22].iter().all(String::is_empty));
    }

    #[test]
    fn save_report_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = AnalysisOutcome {
            symbol: "600755".into(),
            as_of: d(2024, 9, 1),
            records: vec![record()],
            skipped: Vec::new(),
            failed_years: Vec::new(),
            dropped_rows: 0,
        };

        let paths = save_report(dir.path().join("out"), &outcome, true).unwrap();
        assert_eq!(
            paths[0].file_name().unwrap(),
            "dividend_analysis_result_600755.csv"
        );

        let csv = std::fs::read_to_string(&paths[0]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("report_period,cash_per_share,yield_pct"));
        assert!(lines.next().unwrap().starts_with("2023-04-20,0.35,,7.4,2023/05/20"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths[1]).unwrap()).unwrap();
        let rec = &json["records"][0];
        assert!(rec.get("yield_pct").is_none());
        assert!(rec["windows"].get("ex").is_none());
        assert!(rec["windows"].get("record").is_some());
    }

    fn empty_outcome(symbol: &str) -> AnalysisOutcome {
        AnalysisOutcome {
            symbol: symbol.into(),
            as_of: d(2024, 9, 1),
            records: Vec::new(),
            skipped: Vec::new(),
            failed_years: Vec::new(),
            dropped_rows: 0,
        }
    }

    #[test]
    fn outcome_without_records_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let paths = save_report(&out, &empty_outcome("600755"), true).unwrap();
        assert!(paths.is_empty());
        assert!(!out.join("dividend_analysis_result_600755.csv").exists());
    }

    #[test]
    fn symbol_cannot_leave_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut outcome = empty_outcome("../escape");
        outcome.records.push(record());

        assert!(save_report(&out, &outcome, false).is_err());
        assert!(!out.exists());
    }
}
