//! divlab core: domain types, data acquisition and price-window analysis.
//!
//! - Domain types (price points and series, dividend events, exchange
//!   symbols, company profiles)
//! - Data layer: content-hashed Parquet cache, Yahoo and CSV sources behind
//!   capability traits, retry, circuit breaker and scoped sessions
//! - Window analysis: highest high / lowest low around event dates and over
//!   the prior calendar year

pub mod analysis;
pub mod data;
pub mod domain;
