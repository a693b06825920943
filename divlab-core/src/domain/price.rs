//! Price points and the ordered daily series they form.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of a symbol's price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            high,
            low,
            close,
        }
    }

    /// True when every price is a finite number.
    pub fn is_finite(&self) -> bool {
        self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Daily price history for one symbol, ascending by date with unique dates.
///
/// Non-trading days are simply missing; the series never carries placeholder
/// rows for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by date and keeping the first point seen for
    /// any duplicated date.
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Exact-date lookup (binary search, the series is sorted).
    pub fn on(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| &self.points[i])
    }

    /// Points whose date lies in `[start, end]`, inclusive on both ends.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> &[PricePoint] {
        if start > end {
            return &[];
        }
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        &self.points[lo..hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn new_sorts_and_dedupes() {
        let series = PriceSeries::new(
            "600755",
            vec![
                PricePoint::new(d(2024, 1, 3), 11.0, 9.0, 10.0),
                PricePoint::new(d(2024, 1, 2), 10.5, 9.5, 10.2),
                PricePoint::new(d(2024, 1, 3), 99.0, 1.0, 50.0),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(d(2024, 1, 2)));
        // First occurrence of the duplicated date survives.
        assert_eq!(series.on(d(2024, 1, 3)).unwrap().high, 11.0);
    }

    #[test]
    fn between_is_inclusive() {
        let series = PriceSeries::new(
            "X",
            (1..=10)
                .map(|day| PricePoint::new(d(2024, 3, day), 1.0, 1.0, 1.0))
                .collect(),
        );
        let slice = series.between(d(2024, 3, 3), d(2024, 3, 5));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].date, d(2024, 3, 3));
        assert_eq!(slice[2].date, d(2024, 3, 5));
        assert!(series.between(d(2024, 3, 5), d(2024, 3, 3)).is_empty());
    }

    #[test]
    fn on_misses_gaps() {
        let series = PriceSeries::new(
            "X",
            vec![
                PricePoint::new(d(2024, 3, 1), 1.0, 1.0, 1.0),
                PricePoint::new(d(2024, 3, 4), 1.0, 1.0, 1.0),
            ],
        );
        assert!(series.on(d(2024, 3, 2)).is_none());
        assert!(series.on(d(2024, 3, 4)).is_some());
    }

    #[test]
    fn non_finite_points_are_detected() {
        let p = PricePoint::new(d(2024, 1, 2), f64::NAN, 1.0, 1.0);
        assert!(!p.is_finite());
    }
}
