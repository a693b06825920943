//! Dividend events and the event-date kinds analysed around them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which of an event's three dates a window is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDateKind {
    /// Dividend plan announcement.
    Announce,
    /// Record (registration) date.
    Record,
    /// Ex-dividend date.
    Ex,
}

impl EventDateKind {
    pub const ALL: [EventDateKind; 3] = [Self::Announce, Self::Record, Self::Ex];

    /// Column prefix used by the output sink.
    pub fn label(self) -> &'static str {
        match self {
            Self::Announce => "announce_date",
            Self::Record => "record_date",
            Self::Ex => "ex_date",
        }
    }
}

impl std::fmt::Display for EventDateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One dividend distribution as reported by the data source.
///
/// Any event date may be missing upstream. `cash_per_share` is `None` when the
/// source gave nothing parseable; it is never silently zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub report_period: NaiveDate,
    pub announce_date: Option<NaiveDate>,
    pub record_date: Option<NaiveDate>,
    pub ex_date: Option<NaiveDate>,
    pub cash_per_share: Option<f64>,
}

impl DividendEvent {
    pub fn new(report_period: NaiveDate) -> Self {
        Self {
            report_period,
            announce_date: None,
            record_date: None,
            ex_date: None,
            cash_per_share: None,
        }
    }

    pub fn date(&self, kind: EventDateKind) -> Option<NaiveDate> {
        match kind {
            EventDateKind::Announce => self.announce_date,
            EventDateKind::Record => self.record_date,
            EventDateKind::Ex => self.ex_date,
        }
    }

    /// Present event dates, in announce / record / ex order.
    pub fn present_dates(&self) -> impl Iterator<Item = (EventDateKind, NaiveDate)> + '_ {
        EventDateKind::ALL
            .into_iter()
            .filter_map(|kind| self.date(kind).map(|date| (kind, date)))
    }
}
