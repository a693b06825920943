//! Dividend analysis pipeline: events and prices in, one record per event out.
//!
//! Per event, in ascending report-period order:
//! 1. prior-calendar-year window (absent: the event is skipped)
//! 2. yield from the close on the day before the record date
//! 3. a ±radius window around every present event date
//!
//! [`analyze_events`] is the pure part; [`DividendAnalysisPipeline`] adds the
//! two fetches in front of it.

use chrono::{Days, NaiveDate};
use divlab_core::analysis::{prior_calendar_year, window_around, WindowResult, DEFAULT_RADIUS_DAYS};
use divlab_core::data::{
    DataError, DividendEventProvider, PriceSeriesProvider, DEFAULT_YEARS_BACK,
};
use divlab_core::domain::{DividendEvent, EventDateKind, PriceSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{validate_window, ConfigError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Whether the symbol had no usable data, as opposed to a setup failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PipelineError::Data(DataError::DataUnavailable { .. }))
    }
}

/// Analysis of one dividend event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub report_period: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_per_share: Option<f64>,
    /// Cash per share over the prior-day close, in percent, two decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_pct: Option<f64>,
    pub prior_year: WindowResult,
    /// One entry per event date the event actually has.
    pub windows: BTreeMap<EventDateKind, WindowResult>,
}

impl AnalysisRecord {
    pub fn window(&self, kind: EventDateKind) -> Option<&WindowResult> {
        self.windows.get(&kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No price points in the calendar year before the report period.
    InsufficientHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEvent {
    pub report_period: NaiveDate,
    pub reason: SkipReason,
}

/// Records for one symbol plus every diagnostic of what did not make it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub records: Vec<AnalysisRecord>,
    pub skipped: Vec<SkippedEvent>,
    pub failed_years: Vec<i32>,
    pub dropped_rows: usize,
}

/// `cash / close * 100`, rounded to two decimals. Absent cash counts as
/// zero; a non-positive close has no yield.
///
/// Rounding is done on the exact binary value with ties to even, so a
/// quotient stored just below a half rounds down.
pub fn dividend_yield(cash_per_share: Option<f64>, close: f64) -> Option<f64> {
    if close.is_nan() || close <= 0.0 {
        return None;
    }
    let pct = cash_per_share.unwrap_or(0.0) / close * 100.0;
    format!("{pct:.2}").parse().ok()
}

fn yield_for(series: &PriceSeries, event: &DividendEvent) -> Option<f64> {
    let record = event.record_date?;
    let prior_day = record.checked_sub_days(Days::new(1))?;
    let point = series.on(prior_day)?;
    dividend_yield(event.cash_per_share, point.close)
}

/// Fold events over a series. Output keeps the input order of the events
/// that had prior-year history.
pub fn analyze_events(
    series: &PriceSeries,
    events: &[DividendEvent],
    radius_days: u32,
) -> (Vec<AnalysisRecord>, Vec<SkippedEvent>) {
    let mut records = Vec::with_capacity(events.len());
    let mut skipped = Vec::new();

    for event in events {
        let Some(prior_year) = prior_calendar_year(series, event.report_period) else {
            tracing::warn!(
                symbol = series.symbol(),
                report_period = %event.report_period,
                "no prices in prior calendar year, skipping event"
            );
            skipped.push(SkippedEvent {
                report_period: event.report_period,
                reason: SkipReason::InsufficientHistory,
            });
            continue;
        };

        let windows = event
            .present_dates()
            .filter_map(|(kind, date)| window_around(series, date, radius_days).map(|w| (kind, w)))
            .collect();

        records.push(AnalysisRecord {
            report_period: event.report_period,
            cash_per_share: event.cash_per_share,
            yield_pct: yield_for(series, event),
            prior_year,
            windows,
        });
    }

    (records, skipped)
}

pub struct DividendAnalysisPipeline {
    prices: PriceSeriesProvider,
    dividends: DividendEventProvider,
    radius_days: u32,
    years_back: u32,
}

impl DividendAnalysisPipeline {
    /// Prices are fetched up to the dividend provider's as-of date.
    pub fn new(prices: PriceSeriesProvider, dividends: DividendEventProvider) -> Self {
        Self {
            prices,
            dividends,
            radius_days: DEFAULT_RADIUS_DAYS,
            years_back: DEFAULT_YEARS_BACK,
        }
    }

    pub fn with_radius_days(mut self, radius_days: u32) -> Self {
        self.radius_days = radius_days;
        self
    }

    pub fn with_years_back(mut self, years_back: u32) -> Self {
        self.years_back = years_back;
        self
    }

    pub fn as_of(&self) -> NaiveDate {
        self.dividends.as_of()
    }

    pub fn prices(&self) -> &PriceSeriesProvider {
        &self.prices
    }

    /// Analyze every dividend event of `symbol` in the trailing years.
    ///
    /// Only total unavailability of events or prices and an out-of-range
    /// radius or year window are errors; events without prior-year history
    /// are listed in `skipped`.
    pub fn run(&self, symbol: &str) -> Result<AnalysisOutcome, PipelineError> {
        validate_window(self.radius_days, self.years_back)?;
        let as_of = self.as_of();
        let fetched = self.dividends.fetch_events(symbol, self.years_back)?;

        let mut outcome = AnalysisOutcome {
            symbol: symbol.to_string(),
            as_of,
            records: Vec::new(),
            skipped: Vec::new(),
            failed_years: fetched.failed_years,
            dropped_rows: fetched.dropped_rows,
        };

        let mut events = fetched.events;
        if events.is_empty() {
            tracing::info!(symbol, "no dividend events in range");
            return Ok(outcome);
        }
        events.sort_by_key(|e| e.report_period);

        let series = self.prices.fetch(symbol, as_of)?;
        let (records, skipped) = analyze_events(&series, &events, self.radius_days);

        tracing::info!(
            symbol,
            events = events.len(),
            records = records.len(),
            skipped = skipped.len(),
            "analysis complete"
        );
        outcome.records = records;
        outcome.skipped = skipped;
        Ok(outcome)
    }
}
