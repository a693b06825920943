//! Highest high / lowest low over a calendar window of a price series.
//!
//! Two windows are used per dividend event:
//! - around an event date: `[target - r, target + r]` (calendar days)
//! - the prior calendar year: `[Jan 1, Dec 31]` of `report.year - 1`
//!
//! Ties on the extreme value go to the earliest date. An empty window has no
//! result; it is never reported as a zero price.

use crate::domain::{PricePoint, PriceSeries};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_DAYS: u32 = 30;

/// Extremes of one window and the dates they occurred on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// The date the window was anchored on.
    pub target_date: NaiveDate,
    pub high: f64,
    pub high_date: NaiveDate,
    pub low: f64,
    pub low_date: NaiveDate,
}

/// Extremes within `radius_days` calendar days either side of `target`.
pub fn window_around(
    series: &PriceSeries,
    target: NaiveDate,
    radius_days: u32,
) -> Option<WindowResult> {
    let r = Days::new(u64::from(radius_days));
    let start = target.checked_sub_days(r).unwrap_or(NaiveDate::MIN);
    let end = target.checked_add_days(r).unwrap_or(NaiveDate::MAX);
    extremes(series.between(start, end), target)
}

/// Extremes over the calendar year before `report_date`'s year.
pub fn prior_calendar_year(series: &PriceSeries, report_date: NaiveDate) -> Option<WindowResult> {
    let year = report_date.year() - 1;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    extremes(series.between(start, end), report_date)
}

/// [`window_around`] for a target that may be missing.
pub fn window_around_opt(
    series: &PriceSeries,
    target: Option<NaiveDate>,
    radius_days: u32,
) -> Option<WindowResult> {
    target.and_then(|t| window_around(series, t, radius_days))
}

/// [`prior_calendar_year`] for a report date that may be missing.
pub fn prior_calendar_year_opt(
    series: &PriceSeries,
    report_date: Option<NaiveDate>,
) -> Option<WindowResult> {
    report_date.and_then(|d| prior_calendar_year(series, d))
}

fn extremes(points: &[PricePoint], target: NaiveDate) -> Option<WindowResult> {
    let (first, rest) = points.split_first()?;
    let mut result = WindowResult {
        target_date: target,
        high: first.high,
        high_date: first.date,
        low: first.low,
        low_date: first.date,
    };
    // Strict comparisons keep the earliest date on ties.
    for p in rest {
        if p.high > result.high {
            result.high = p.high;
            result.high_date = p.date;
        }
        if p.low < result.low {
            result.low = p.low;
            result.low_date = p.date;
        }
    }
    Some(result)
}
