//! Domain types for divlab

pub mod dividend;
pub mod price;
pub mod profile;
pub mod symbol;

pub use dividend::{DividendEvent, EventDateKind};
pub use price::{PricePoint, PriceSeries};
pub use profile::StockProfile;
pub use symbol::{Exchange, Symbol};
