//! Data acquisition and caching

pub mod cache;
pub mod circuit_breaker;
pub mod csv_source;
pub mod dividends;
pub mod normalize;
pub mod prices;
pub mod profiles;
pub mod provider;
pub mod retry;
pub mod session;
pub mod yahoo;

pub use cache::{init_cache, CacheMeta, TimeSeriesCache};
pub use circuit_breaker::CircuitBreaker;
pub use csv_source::{
    CsvDividendSource, CsvPriceSource, CsvProfileSource, PriceColumns, CSRC_CLASSIFICATION,
};
pub use dividends::{DividendEventProvider, DividendEvents, DEFAULT_YEARS_BACK, MAX_YEARS_BACK};
pub use prices::PriceSeriesProvider;
pub use profiles::{ProfileLookup, Profiles};
pub use provider::{
    DataError, DividendSource, FieldMap, PriceSource, ProfileSource, ProviderRow, RawBar,
    Session,
};
pub use retry::RetryPolicy;
pub use session::SessionGuard;
pub use yahoo::YahooProvider;
