//! Dividend event fetch over a trailing window of calendar years.

use super::normalize::{parse_date, parse_decimal};
use super::provider::{DataError, DividendSource, FieldMap, ProviderRow};
use super::retry::RetryPolicy;
use super::session::SessionGuard;
use crate::domain::DividendEvent;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_YEARS_BACK: u32 = 5;
/// Upper bound on the trailing year window.
pub const MAX_YEARS_BACK: u32 = 100;

/// Normalized events plus what was lost on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DividendEvents {
    /// Year-ascending concatenation of every year's rows.
    pub events: Vec<DividendEvent>,
    /// Years whose query failed after retries.
    pub failed_years: Vec<i32>,
    /// Rows dropped for an unreadable report period.
    pub dropped_rows: usize,
}

pub struct DividendEventProvider {
    source: Arc<dyn DividendSource>,
    retry: RetryPolicy,
    as_of: NaiveDate,
}

impl DividendEventProvider {
    /// `as_of` anchors the trailing year window.
    pub fn new(source: Arc<dyn DividendSource>, as_of: NaiveDate) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
            as_of,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Calendar years queried for `years_back`, oldest first. The window
    /// is clamped to `1..=MAX_YEARS_BACK` years.
    pub fn years(&self, years_back: u32) -> std::ops::RangeInclusive<i32> {
        let last = self.as_of.year();
        let span = i32::try_from(years_back.clamp(1, MAX_YEARS_BACK)).unwrap_or(1);
        last.saturating_sub(span - 1)..=last
    }

    /// Events of `symbol` over the trailing `years_back` calendar years,
    /// inclusive of the as-of year.
    ///
    /// A failing year contributes no rows and is listed in `failed_years`.
    /// A failed login, or every year failing, is `DataUnavailable`.
    pub fn fetch_events(&self, symbol: &str, years_back: u32) -> Result<DividendEvents, DataError> {
        let source = self.source.as_ref();
        let field_map = source.field_map();
        let _session = SessionGuard::acquire(source, source.name())
            .map_err(|e| DataError::unavailable(symbol, e))?;

        let years = self.years(years_back);
        let queried = years.clone().count();
        let mut out = DividendEvents::default();

        for year in years {
            let rows = match self.retry.run(&format!("query_dividends {symbol} {year}"), |_| {
                source.query_dividends(symbol, year)
            }) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(symbol, year, error = %e, "dividend query failed, skipping year");
                    out.failed_years.push(year);
                    continue;
                }
            };

            for row in &rows {
                match normalize_row(&field_map, row) {
                    Ok(event) => out.events.push(event),
                    Err(e) => {
                        tracing::warn!(symbol, year, error = %e, "dropped dividend row");
                        out.dropped_rows += 1;
                    }
                }
            }
        }

        if out.failed_years.len() == queried {
            return Err(DataError::unavailable(
                symbol,
                format!("all {queried} dividend queries to {} failed", source.name()),
            ));
        }

        tracing::info!(
            symbol,
            source = source.name(),
            events = out.events.len(),
            failed_years = out.failed_years.len(),
            dropped = out.dropped_rows,
            "fetched dividend events"
        );
        Ok(out)
    }
}

/// Map one provider row onto a [`DividendEvent`].
///
/// The report period is required; event dates and cash are optional and an
/// unreadable value is treated as absent.
pub fn normalize_row(map: &FieldMap, row: &ProviderRow) -> Result<DividendEvent, DataError> {
    let raw_period = row.get(&map.report_period).map(String::as_str).unwrap_or("");
    let report_period = parse_date(raw_period).ok_or_else(|| {
        DataError::MalformedRecord(format!(
            "{} = '{raw_period}' is not a date",
            map.report_period
        ))
    })?;

    let mut event = DividendEvent::new(report_period);
    event.announce_date = field(row, &map.announce_date).and_then(parse_date);
    event.record_date = field(row, &map.record_date).and_then(parse_date);
    event.ex_date = field(row, &map.ex_date).and_then(parse_date);
    event.cash_per_share = field(row, &map.cash_per_share).and_then(parse_decimal);
    Ok(event)
}

fn field<'r>(row: &'r ProviderRow, label: &Option<String>) -> Option<&'r str> {
    label.as_ref().and_then(|l| row.get(l)).map(String::as_str)
}
