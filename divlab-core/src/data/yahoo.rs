//! Yahoo Finance source for daily prices and dividend events.
//!
//! Uses the v8 chart API. One call is one HTTP request; retry policy lives in
//! the providers above. A shared circuit breaker stops all requests after an
//! IP ban or a run of failures.
//!
//! Yahoo only reports the ex-dividend date and cash amount of a dividend, so
//! events from this source carry no announcement or record date.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DividendSource, FieldMap, PriceSource, ProviderRow, RawBar, Session,
};
use crate::domain::Symbol;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const ROW_DATE: &str = "date";
const ROW_AMOUNT: &str = "amount";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    dividends: Option<HashMap<String, DividendEntry>>,
}

#[derive(Debug, Deserialize)]
struct DividendEntry {
    amount: f64,
    date: i64,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    timeout: Duration,
    history_start: NaiveDate,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            timeout,
            history_start: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        })
    }

    /// Earliest date requested when fetching a full price history.
    pub fn with_history_start(mut self, start: NaiveDate) -> Self {
        self.history_start = start;
        self
    }

    /// Chart API URL covering `[start, end]`.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate, dividends: bool) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        let events = if dividends { "&events=div" } else { "" };
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d{events}"
        )
    }

    fn get_chart(&self, symbol: &str, url: &str) -> Result<ChartResponse, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        tracing::debug!(symbol, url, "yahoo request");
        let resp = self.client.get(url).send().map_err(|e| {
            self.circuit_breaker.record_failure();
            if e.is_timeout() {
                DataError::Timeout {
                    secs: self.timeout.as_secs(),
                }
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Http {
                status: status.as_u16(),
                message: format!("chart request for {symbol}"),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        self.circuit_breaker.record_success();
        Ok(chart)
    }
}

/// First chart result, or the error Yahoo reported instead.
fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
}

fn date_from_ts(ts: i64) -> Result<NaiveDate, DataError> {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
}

fn parse_bars(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
    let data = first_result(symbol, resp)?;
    // A listing with no trading history has neither timestamps nor quotes.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };
    let quote = data
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();

        // Holidays come back as all-null rows.
        if high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        bars.push(RawBar {
            date: date_from_ts(ts)?,
            high,
            low,
            close,
        });
    }
    Ok(bars)
}

fn parse_dividends(symbol: &str, year: i32, resp: ChartResponse) -> Result<Vec<ProviderRow>, DataError> {
    let data = first_result(symbol, resp)?;
    let Some(dividends) = data.events.and_then(|e| e.dividends) else {
        return Ok(Vec::new());
    };

    let mut entries: Vec<(NaiveDate, f64)> = dividends
        .into_values()
        .map(|d| date_from_ts(d.date).map(|date| (date, d.amount)))
        .collect::<Result<_, _>>()?;
    entries.retain(|(date, _)| chrono::Datelike::year(date) == year);
    entries.sort_by_key(|(date, _)| *date);

    Ok(entries
        .into_iter()
        .map(|(date, amount)| {
            ProviderRow::from([
                (ROW_DATE.to_string(), date.format("%Y-%m-%d").to_string()),
                (ROW_AMOUNT.to_string(), amount.to_string()),
            ])
        })
        .collect())
}

impl Session for YahooProvider {}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily(&self, symbol: &str, end: NaiveDate) -> Result<Vec<RawBar>, DataError> {
        let ticker = Symbol::parse(symbol).yahoo_ticker();
        let url = Self::chart_url(&ticker, self.history_start, end, false);
        let chart = self.get_chart(symbol, &url)?;
        let mut bars = parse_bars(symbol, chart)?;
        bars.retain(|b| b.date <= end);
        Ok(bars)
    }
}

impl DividendSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn field_map(&self) -> FieldMap {
        FieldMap {
            report_period: ROW_DATE.into(),
            announce_date: None,
            record_date: None,
            ex_date: Some(ROW_DATE.into()),
            cash_per_share: Some(ROW_AMOUNT.into()),
        }
    }

    fn query_dividends(&self, symbol: &str, year: i32) -> Result<Vec<ProviderRow>, DataError> {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Err(DataError::Other(format!("year out of range: {year}")));
        };
        let ticker = Symbol::parse(symbol).yahoo_ticker();
        let url = Self::chart_url(&ticker, start, end, true);
        let chart = self.get_chart(symbol, &url)?;
        parse_dividends(symbol, year, chart)
    }
}
