//! External capability traits and structured error types.
//!
//! Price and dividend sources (Yahoo Finance, local CSV exports) sit behind
//! these traits so the providers above them can be exercised with fakes. The
//! cache layer sits above the traits; sources don't know about the cache.

use crate::domain::StockProfile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Raw daily bar as a price source reports it, before normalization.
///
/// Missing prices stay `None` here; the price provider decides what to drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// One dividend row keyed by the provider's own field labels.
pub type ProviderRow = BTreeMap<String, String>;

/// Structured error types for data operations.
///
/// Displayable as-is in CLI output and log lines.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("session error: {0}")]
    Session(String),

    #[error("data unavailable for '{symbol}': {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("corrupt cache entry: {0}")]
    CacheCorrupt(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_)
            | DataError::Timeout { .. }
            | DataError::RateLimited { .. } => true,
            DataError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn unavailable(symbol: &str, reason: impl std::fmt::Display) -> Self {
        DataError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Login/logout capability of an external data service.
///
/// Stateless HTTP sources keep the no-op defaults. Use
/// [`SessionGuard`](super::session::SessionGuard) rather than calling these
/// directly so logout runs on every exit path.
pub trait Session {
    fn login(&self) -> Result<(), DataError> {
        Ok(())
    }

    fn logout(&self) -> Result<(), DataError> {
        Ok(())
    }
}

/// Source of daily price bars.
pub trait PriceSource: Session + Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch every daily bar up to and including `end`.
    fn fetch_daily(&self, symbol: &str, end: NaiveDate) -> Result<Vec<RawBar>, DataError>;
}

/// Provider labels for each canonical dividend field.
///
/// `None` means the source never reports that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub report_period: String,
    pub announce_date: Option<String>,
    pub record_date: Option<String>,
    pub ex_date: Option<String>,
    pub cash_per_share: Option<String>,
}

impl FieldMap {
    /// baostock `query_dividend_data` column labels.
    pub fn baostock() -> Self {
        Self {
            report_period: "dividPlanAnnounceDate".into(),
            announce_date: Some("dividPlanDate".into()),
            record_date: Some("dividRegistDate".into()),
            ex_date: Some("dividOperateDate".into()),
            cash_per_share: Some("dividCashPsBeforeTax".into()),
        }
    }
}

/// Source of dividend announcement rows.
pub trait DividendSource: Session + Send + Sync {
    fn name(&self) -> &str;

    /// How this source labels the canonical dividend fields.
    fn field_map(&self) -> FieldMap;

    /// All dividend rows the source files under calendar `year`.
    fn query_dividends(&self, symbol: &str, year: i32) -> Result<Vec<ProviderRow>, DataError>;
}

/// Source of company names and industry classifications.
pub trait ProfileSource: Session + Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the source does not list `symbol`.
    fn stock_profile(&self, symbol: &str) -> Result<Option<StockProfile>, DataError>;
}
