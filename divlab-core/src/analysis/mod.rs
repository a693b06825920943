//! Price-window statistics around dividend event dates.

pub mod window;

pub use window::{
    prior_calendar_year, prior_calendar_year_opt, window_around, window_around_opt, WindowResult,
    DEFAULT_RADIUS_DAYS,
};
