//! End-to-end pipeline tests with in-memory sources and an on-disk cache.

use chrono::NaiveDate;
use divlab_core::data::{
    init_cache, DataError, DividendEventProvider, DividendSource, FieldMap,
    PriceSeriesProvider, PriceSource, ProviderRow, RawBar, RetryPolicy, Session,
};
use divlab_core::domain::EventDateKind;
use divlab_runner::{
    analyze_symbols, save_report, AnalysisOutcome, AnalysisProgress, BatchSummary,
    DividendAnalysisPipeline, PipelineError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ── Fakes ────────────────────────────────────────────────────────────

/// Daily bars at a constant close, per symbol, with optional holes.
#[derive(Default)]
struct FlatPrices {
    closes: HashMap<String, f64>,
    holes: Vec<NaiveDate>,
    calls: AtomicU32,
}

impl Session for FlatPrices {}

impl PriceSource for FlatPrices {
    fn name(&self) -> &str {
        "flat"
    }

    fn fetch_daily(&self, symbol: &str, end: NaiveDate) -> Result<Vec<RawBar>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let close = *self.closes.get(symbol).ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        Ok(d(2021, 1, 1)
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| !self.holes.contains(day))
            .map(|date| RawBar {
                date,
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
            })
            .collect())
    }
}

/// baostock-labelled rows keyed by (symbol, year); a missing key is an
/// empty year, an `Err` entry a failing one.
#[derive(Default)]
struct Dividends {
    rows: HashMap<(String, i32), Result<Vec<ProviderRow>, DataError>>,
}

impl Dividends {
    fn add(&mut self, symbol: &str, year: i32, rows: Vec<ProviderRow>) {
        self.rows.insert((symbol.to_string(), year), Ok(rows));
    }

    fn fail(&mut self, symbol: &str, year: i32) {
        self.rows.insert(
            (symbol.to_string(), year),
            Err(DataError::Http {
                status: 400,
                message: "bad request".into(),
            }),
        );
    }
}

impl Session for Dividends {}

impl DividendSource for Dividends {
    fn name(&self) -> &str {
        "dividends"
    }

    fn field_map(&self) -> FieldMap {
        FieldMap::baostock()
    }

    fn query_dividends(&self, symbol: &str, year: i32) -> Result<Vec<ProviderRow>, DataError> {
        self.rows
            .get(&(symbol.to_string(), year))
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn row(period: &str, announce: &str, record: &str, ex: &str, cash: &str) -> ProviderRow {
    [
        ("dividPlanAnnounceDate", period),
        ("dividPlanDate", announce),
        ("dividRegistDate", record),
        ("dividOperateDate", ex),
        ("dividCashPsBeforeTax", cash),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn pipeline(
    prices: Arc<FlatPrices>,
    dividends: Dividends,
    cache_dir: &std::path::Path,
) -> DividendAnalysisPipeline {
    let cache = init_cache(cache_dir).unwrap();
    let prices = PriceSeriesProvider::new(prices, cache).with_retry(RetryPolicy::none());
    let dividends = DividendEventProvider::new(Arc::new(dividends), d(2024, 9, 1))
        .with_retry(RetryPolicy::none());
    DividendAnalysisPipeline::new(prices, dividends)
}

fn flat(symbol: &str, close: f64) -> FlatPrices {
    let mut prices = FlatPrices::default();
    prices.closes.insert(symbol.to_string(), close);
    prices
}

// ── Single symbol ────────────────────────────────────────────────────

#[test]
fn yield_from_prior_day_close() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    dividends.add(
        "600755",
        2023,
        vec![row("2023-04-20", "2023-05-18", "2023-06-01", "2023-06-02", "2.0")],
    );

    let outcome = pipeline(Arc::new(flat("600755", 40.0)), dividends, tmp.path())
        .run("600755")
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.yield_pct, Some(5.0));
    assert_eq!(record.prior_year.high, 41.0);
    assert_eq!(record.windows.len(), 3);
}

#[test]
fn missing_prior_day_point_keeps_record_without_yield() {
    let tmp = tempfile::tempdir().unwrap();
    let mut prices = flat("600755", 40.0);
    prices.holes.push(d(2023, 5, 31));
    let mut dividends = Dividends::default();
    dividends.add(
        "600755",
        2023,
        vec![row("2023-04-20", "", "2023-06-01", "", "2.0")],
    );

    let outcome = pipeline(Arc::new(prices), dividends, tmp.path())
        .run("600755")
        .unwrap();

    let record = &outcome.records[0];
    assert_eq!(record.yield_pct, None);
    assert_eq!(record.prior_year.target_date, d(2023, 4, 20));
    assert!(record.windows.contains_key(&EventDateKind::Record));
}

#[test]
fn missing_ex_date_omits_its_window() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    dividends.add(
        "600755",
        2023,
        vec![row("2023-04-20", "2023-05-18", "2023-06-01", "", "0.4")],
    );

    let outcome = pipeline(Arc::new(flat("600755", 8.0)), dividends, tmp.path())
        .run("600755")
        .unwrap();

    let record = &outcome.records[0];
    assert!(record.window(EventDateKind::Ex).is_none());
    assert!(record.window(EventDateKind::Announce).is_some());
    assert_eq!(record.yield_pct, Some(5.0));
    assert_eq!(record.cash_per_share, Some(0.4));
}

#[test]
fn failing_year_only_loses_its_own_events() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    dividends.add("600755", 2022, vec![row("2022-04-21", "", "2022-06-02", "", "0.3")]);
    dividends.fail("600755", 2023);
    dividends.add("600755", 2024, vec![row("2024-04-19", "", "2024-05-30", "", "0.5")]);

    let outcome = pipeline(Arc::new(flat("600755", 10.0)), dividends, tmp.path())
        .run("600755")
        .unwrap();

    let periods: Vec<_> = outcome.records.iter().map(|r| r.report_period).collect();
    assert_eq!(periods, vec![d(2022, 4, 21), d(2024, 4, 19)]);
    assert_eq!(outcome.failed_years, vec![2023]);
}

#[test]
fn events_before_price_history_are_skipped_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    // Prices start in 2021, so 2021 has no prior calendar year.
    dividends.add("600755", 2021, vec![row("2021-04-21", "", "", "", "0.3")]);
    dividends.add("600755", 2022, vec![row("2022-04-21", "", "", "", "0.3")]);

    let outcome = pipeline(Arc::new(flat("600755", 10.0)), dividends, tmp.path())
        .with_years_back(5)
        .run("600755")
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].report_period, d(2021, 4, 21));
}

#[test]
fn no_events_skips_price_fetch() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = Arc::new(flat("600755", 10.0));
    let outcome = pipeline(prices.clone(), Dividends::default(), tmp.path())
        .run("600755")
        .unwrap();

    assert!(outcome.records.is_empty());
    assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_price_symbol_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    dividends.add("000651", 2023, vec![row("2023-04-28", "", "", "", "1.0")]);

    let err = pipeline(Arc::new(flat("600755", 10.0)), dividends, tmp.path())
        .run("000651")
        .unwrap_err();
    assert!(err.is_unavailable());
}

#[test]
fn out_of_range_window_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let prices = Arc::new(flat("600755", 10.0));
    let err = pipeline(prices.clone(), Dividends::default(), tmp.path())
        .with_radius_days(0)
        .run("600755")
        .unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert!(!err.is_unavailable());
    assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
}

// ── Batch ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    events: Mutex<Vec<String>>,
}

impl AnalysisProgress for Recording {
    fn on_start(&self, symbol: &str, _index: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("start {symbol}"));
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<&AnalysisOutcome, &PipelineError>,
    ) {
        let tag = if result.is_ok() { "ok" } else { "fail" };
        self.events.lock().unwrap().push(format!("{tag} {symbol}"));
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {}", summary.total));
    }
}

#[test]
fn batch_skips_unavailable_symbols_and_saves_reports() {
    let tmp = tempfile::tempdir().unwrap();
    let mut prices = flat("600755", 10.0);
    prices.closes.insert("601398".into(), 5.0);

    let mut dividends = Dividends::default();
    dividends.add("600755", 2023, vec![row("2023-04-20", "", "2023-06-01", "", "0.5")]);
    dividends.add("601398", 2024, vec![row("2024-04-01", "", "2024-07-01", "", "0.25")]);
    dividends.add("000651", 2024, vec![row("2024-04-28", "", "", "", "1.0")]);

    let pipeline = pipeline(Arc::new(prices), dividends, &tmp.path().join("cache"));
    let out_dir = tmp.path().join("out");
    let progress = Recording::default();

    let summary = analyze_symbols(&pipeline, &["600755", "000651", "601398"], &progress, |o| {
        save_report(&out_dir, o, false).map(|_| ())
    })
    .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, vec!["600755", "601398"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "000651");
    assert_eq!(summary.records, 2);

    assert!(out_dir.join("dividend_analysis_result_600755.csv").exists());
    assert!(out_dir.join("dividend_analysis_result_601398.csv").exists());
    assert!(!out_dir.join("dividend_analysis_result_000651.csv").exists());

    let log = progress.events.lock().unwrap().clone();
    assert_eq!(log.first().map(String::as_str), Some("start 600755"));
    assert!(log.contains(&"fail 000651".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("done 3"));
}

#[test]
fn batch_aborts_on_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dividends = Dividends::default();
    dividends.add("600755", 2023, vec![row("2023-04-20", "", "2023-06-01", "", "0.5")]);

    let pipeline = pipeline(Arc::new(flat("600755", 10.0)), dividends, tmp.path())
        .with_years_back(1000);
    let progress = Recording::default();
    let mut saved = 0;

    let result = analyze_symbols(&pipeline, &["600755", "601398"], &progress, |_| {
        saved += 1;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(saved, 0);
    let log = progress.events.lock().unwrap().clone();
    assert_eq!(log, vec!["start 600755", "fail 600755"]);
}
