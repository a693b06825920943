//! Local CSV exports as price and dividend sources.
//!
//! The offline path: when the network source is unavailable, previously
//! exported files can stand in for it. Column labels are configurable so
//! exports from different tools can be read without reshaping them first.

use super::normalize::{parse_date, parse_decimal};
use super::provider::{
    DataError, DividendSource, FieldMap, PriceSource, ProfileSource, ProviderRow, RawBar, Session,
};
use crate::domain::{StockProfile, Symbol};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Column labels of a daily price export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceColumns {
    pub date: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

impl Default for PriceColumns {
    fn default() -> Self {
        Self {
            date: "date".into(),
            high: "high".into(),
            low: "low".into(),
            close: "close".into(),
        }
    }
}

/// Reads `{dir}/{symbol}.csv`.
pub struct CsvPriceSource {
    dir: PathBuf,
    columns: PriceColumns,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            columns: PriceColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: PriceColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Export file of `symbol`. Codes that would resolve outside `dir` have
    /// no file.
    fn path_for(&self, symbol: &str) -> Option<PathBuf> {
        let symbol = Symbol::parse(symbol);
        symbol
            .is_file_safe()
            .then(|| self.dir.join(format!("{}.csv", symbol.code())))
    }
}

fn column_index(headers: &csv::StringRecord, label: &str, path: &Path) -> Result<usize, DataError> {
    headers.iter().position(|h| h.trim() == label).ok_or_else(|| {
        DataError::ResponseFormatChanged(format!("{}: missing column '{label}'", path.display()))
    })
}

fn read_records(path: &Path) -> Result<(csv::StringRecord, Vec<csv::StringRecord>), DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Other(format!("{}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("{}: {e}", path.display())))?
        .clone();
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DataError::ResponseFormatChanged(format!("{}: {e}", path.display())))?;
    Ok((headers, records))
}

impl Session for CsvPriceSource {}

impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv_prices"
    }

    fn fetch_daily(&self, symbol: &str, end: NaiveDate) -> Result<Vec<RawBar>, DataError> {
        let Some(path) = self.path_for(symbol).filter(|p| p.exists()) else {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };

        let (headers, records) = read_records(&path)?;
        let date_idx = column_index(&headers, &self.columns.date, &path)?;
        let high_idx = column_index(&headers, &self.columns.high, &path)?;
        let low_idx = column_index(&headers, &self.columns.low, &path)?;
        let close_idx = column_index(&headers, &self.columns.close, &path)?;

        let mut bars = Vec::with_capacity(records.len());
        for (line, record) in records.iter().enumerate() {
            let field = move |i: usize| record.get(i).unwrap_or("");
            let Some(date) = parse_date(field(date_idx)) else {
                tracing::warn!(symbol, line = line + 2, value = field(date_idx), "unparseable date in price export");
                continue;
            };
            if date > end {
                continue;
            }
            bars.push(RawBar {
                date,
                high: parse_decimal(field(high_idx)),
                low: parse_decimal(field(low_idx)),
                close: parse_decimal(field(close_idx)),
            });
        }
        Ok(bars)
    }
}

/// A single CSV of dividend rows for many symbols, e.g. a baostock
/// `query_dividend_data` export with an added `code` column.
pub struct CsvDividendSource {
    path: PathBuf,
    code_column: String,
    field_map: FieldMap,
}

impl CsvDividendSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            code_column: "code".into(),
            field_map: FieldMap::baostock(),
        }
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn with_code_column(mut self, column: impl Into<String>) -> Self {
        self.code_column = column.into();
        self
    }
}

impl Session for CsvDividendSource {}

impl DividendSource for CsvDividendSource {
    fn name(&self) -> &str {
        "csv_dividends"
    }

    fn field_map(&self) -> FieldMap {
        self.field_map.clone()
    }

    fn query_dividends(&self, symbol: &str, year: i32) -> Result<Vec<ProviderRow>, DataError> {
        let (headers, records) = read_records(&self.path)?;
        let code_idx = column_index(&headers, &self.code_column, &self.path)?;
        let report_idx = column_index(&headers, &self.field_map.report_period, &self.path)?;

        let wanted = Symbol::parse(symbol);
        let dotted = wanted.dotted_code();

        let rows = records
            .iter()
            .filter(|r| {
                let code = r.get(code_idx).unwrap_or("").trim();
                code == wanted.code() || code == dotted
            })
            .filter(|r| {
                // Rows are filed under the year of their report period; a row
                // without a readable one is passed through once, under its
                // leading four digits, so normalization can count it.
                let raw = r.get(report_idx).unwrap_or("");
                match parse_date(raw) {
                    Some(date) => date.year() == year,
                    None => raw.trim().get(..4).and_then(|y| y.parse::<i32>().ok()) == Some(year),
                }
            })
            .map(|r| {
                headers
                    .iter()
                    .zip(r.iter())
                    .map(|(h, v)| (h.trim().to_string(), v.to_string()))
                    .collect::<ProviderRow>()
            })
            .collect();
        Ok(rows)
    }
}

/// CSRC classification label in baostock industry exports.
pub const CSRC_CLASSIFICATION: &str = "证监会行业分类";

/// A baostock `query_stock_industry` export
/// (`updateDate,code,code_name,industry,industryClassification`).
///
/// A code may appear once per classification scheme; only rows of the
/// configured scheme supply the industry. Exports without a classification
/// column take the first non-empty industry.
pub struct CsvProfileSource {
    path: PathBuf,
    classification: String,
}

impl CsvProfileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            classification: CSRC_CLASSIFICATION.into(),
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }
}

impl Session for CsvProfileSource {}

impl ProfileSource for CsvProfileSource {
    fn name(&self) -> &str {
        "csv_profiles"
    }

    fn stock_profile(&self, symbol: &str) -> Result<Option<StockProfile>, DataError> {
        let (headers, records) = read_records(&self.path)?;
        let code_idx = column_index(&headers, "code", &self.path)?;
        let name_idx = column_index(&headers, "code_name", &self.path)?;
        let industry_idx = column_index(&headers, "industry", &self.path)?;
        let scheme_idx = headers
            .iter()
            .position(|h| h.trim() == "industryClassification");

        let wanted = Symbol::parse(symbol);
        let dotted = wanted.dotted_code();
        let rows: Vec<_> = records
            .iter()
            .filter(|r| {
                let code = r.get(code_idx).unwrap_or("").trim();
                code == wanted.code() || code == dotted
            })
            .collect();

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let industry = rows
            .iter()
            .filter(|r| match scheme_idx {
                Some(i) => r.get(i).unwrap_or("").trim() == self.classification,
                None => true,
            })
            .map(|r| r.get(industry_idx).unwrap_or("").trim())
            .find(|industry| !industry.is_empty())
            .map(String::from);

        Ok(Some(StockProfile {
            code: wanted.code().to_string(),
            name: first.get(name_idx).unwrap_or("").trim().to_string(),
            industry,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_price_export_with_custom_labels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("600755.csv"),
            "日期,最高,最低,收盘\n2024-01-03,7.4,7.1,7.2\n2024-01-02,7.3,7.0,bad\nnot-a-date,1,1,1\n2024-02-01,8,8,8\n",
        )
        .unwrap();

        let source = CsvPriceSource::new(dir.path()).with_columns(PriceColumns {
            date: "日期".into(),
            high: "最高".into(),
            low: "最低".into(),
            close: "收盘".into(),
        });
        let bars = source
            .fetch_daily("600755", NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].high, Some(7.4));
        assert_eq!(bars[1].close, None);
    }

    #[test]
    fn missing_price_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvPriceSource::new(dir.path());
        assert!(matches!(
            source.fetch_daily("000001", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn symbol_cannot_leave_price_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("prices");
        fs::create_dir(&dir).unwrap();
        fs::write(root.path().join("x.csv"), "date,high,low,close\n2024-01-02,1,1,1\n").unwrap();

        let source = CsvPriceSource::new(&dir);
        assert!(matches!(
            source.fetch_daily("../x", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn missing_column_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("X.csv"), "date,high,low\n2024-01-02,1,1\n").unwrap();
        let source = CsvPriceSource::new(dir.path());
        assert!(matches!(
            source.fetch_daily("X", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn dividend_rows_filtered_by_code_and_year() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dividends.csv");
        fs::write(
            &path,
            "code,dividPlanAnnounceDate,dividPlanDate,dividRegistDate,dividOperateDate,dividCashPsBeforeTax\n\
             sh.600755,2023-04-20,2023-05-18,2023-06-01,2023-06-02,0.35\n\
             sh.600755,2022-04-21,2022-05-19,2022-06-02,2022-06-06,0.3\n\
             sz.000651,2023-04-28,2023-06-20,2023-06-29,2023-06-30,1.0\n\
             600755,2023-08-30,,,,\n",
        )
        .unwrap();

        let source = CsvDividendSource::new(&path);
        let rows = source.query_dividends("600755", 2023).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["dividRegistDate"], "2023-06-01");
        assert_eq!(rows[0]["dividCashPsBeforeTax"], "0.35");
        assert_eq!(rows[1]["dividPlanAnnounceDate"], "2023-08-30");
        assert!(source.query_dividends("600755", 2021).unwrap().is_empty());
    }

    const INDUSTRY_EXPORT: &str = "updateDate,code,code_name,industry,industryClassification\n\
        2024-06-03,sh.600036,招商银行,J66货币金融服务,证监会行业分类\n\
        2024-06-03,sh.600036,招商银行,银行,申万一级行业\n\
        2024-06-03,sz.000651,格力电器,,证监会行业分类\n";

    #[test]
    fn profile_uses_configured_classification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("industry.csv");
        fs::write(&path, INDUSTRY_EXPORT).unwrap();

        let csrc = CsvProfileSource::new(&path);
        let profile = csrc.stock_profile("600036").unwrap().unwrap();
        assert_eq!(profile.code, "600036");
        assert_eq!(profile.name, "招商银行");
        assert_eq!(profile.industry.as_deref(), Some("J66货币金融服务"));

        let sw = CsvProfileSource::new(&path).with_classification("申万一级行业");
        let profile = sw.stock_profile("600036").unwrap().unwrap();
        assert_eq!(profile.industry.as_deref(), Some("银行"));
    }

    #[test]
    fn unclassified_and_unlisted_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("industry.csv");
        fs::write(&path, INDUSTRY_EXPORT).unwrap();
        let source = CsvProfileSource::new(&path);

        let gree = source.stock_profile("000651").unwrap().unwrap();
        assert_eq!(gree.industry, None);
        assert_eq!(gree.industry_or_unknown(), "unknown");
        assert_eq!(source.stock_profile("601398").unwrap(), None);
    }
}
