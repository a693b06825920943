//! Cache-first daily price series fetch.

use super::cache::TimeSeriesCache;
use super::provider::{DataError, PriceSource, RawBar};
use super::retry::RetryPolicy;
use super::session::SessionGuard;
use crate::domain::{PricePoint, PriceSeries};
use chrono::NaiveDate;
use std::sync::Arc;

/// Fetches a symbol's daily high/low/close history, consulting the cache
/// before the external source and filling it after.
pub struct PriceSeriesProvider {
    source: Arc<dyn PriceSource>,
    cache: TimeSeriesCache,
    retry: RetryPolicy,
}

impl PriceSeriesProvider {
    pub fn new(source: Arc<dyn PriceSource>, cache: TimeSeriesCache) -> Self {
        Self {
            source,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &TimeSeriesCache {
        &self.cache
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Series for `symbol` up to and including `end`.
    ///
    /// A cached snapshot for `(symbol, end)` is returned as-is. Otherwise the
    /// source is queried, the bars normalized and the result cached. Source
    /// failure (after retries) and an empty normalized series are both
    /// `DataUnavailable`.
    pub fn fetch(&self, symbol: &str, end: NaiveDate) -> Result<PriceSeries, DataError> {
        if let Some(series) = self.cache.get(symbol, end) {
            return Ok(series);
        }

        let bars = self
            .fetch_remote(symbol, end)
            .map_err(|e| DataError::unavailable(symbol, e))?;
        let raw_count = bars.len();
        let (series, dropped) = normalize_bars(symbol, end, bars);

        if dropped > 0 {
            let err = DataError::MalformedRecord(format!(
                "{dropped} of {raw_count} price rows lacked a finite high/low/close"
            ));
            tracing::warn!(symbol, dropped, error = %err, "dropped price rows");
        }
        if series.is_empty() {
            return Err(DataError::unavailable(
                symbol,
                format!("{} returned no usable price rows", self.source.name()),
            ));
        }

        tracing::info!(
            symbol,
            source = self.source.name(),
            points = series.len(),
            first = ?series.first_date(),
            last = ?series.last_date(),
            "fetched price series"
        );
        self.cache.put(symbol, end, &series);
        Ok(series)
    }

    /// [`fetch`](Self::fetch) with today's local date as the end.
    pub fn fetch_today(&self, symbol: &str) -> Result<PriceSeries, DataError> {
        self.fetch(symbol, chrono::Local::now().date_naive())
    }

    fn fetch_remote(&self, symbol: &str, end: NaiveDate) -> Result<Vec<RawBar>, DataError> {
        let source = self.source.as_ref();
        let _session = SessionGuard::acquire(source, source.name())?;
        self.retry
            .run(&format!("fetch_daily {symbol}"), |_| source.fetch_daily(symbol, end))
    }
}

/// Turn raw bars into a [`PriceSeries`], returning it with the number of
/// rows dropped for a missing or non-finite price. Bars dated after `end`
/// are discarded without being counted.
pub fn normalize_bars(symbol: &str, end: NaiveDate, bars: Vec<RawBar>) -> (PriceSeries, usize) {
    let mut dropped = 0usize;
    let points: Vec<PricePoint> = bars
        .into_iter()
        .filter(|bar| bar.date <= end)
        .filter_map(|bar| {
            let point = match (bar.high, bar.low, bar.close) {
                (Some(high), Some(low), Some(close)) => PricePoint::new(bar.date, high, low, close),
                _ => {
                    tracing::debug!(symbol, date = %bar.date, "price row with missing field");
                    dropped += 1;
                    return None;
                }
            };
            if point.is_finite() {
                Some(point)
            } else {
                tracing::debug!(symbol, date = %bar.date, "price row with non-finite field");
                dropped += 1;
                None
            }
        })
        .collect();
    (PriceSeries::new(symbol, points), dropped)
}
