//! Type-aware ordering of field values.
//!
//! Sort indexes order documents by a [`SortKey`] derived from one field.
//! Numbers compare numerically, strings that parse as RFC 3339 datetimes or
//! `YYYY-MM-DD` dates compare chronologically, other strings compare by
//! code point. Values of different kinds never interleave: numbers come
//! first, then dates, then strings, then everything else (missing fields,
//! booleans, maps, arrays, null), which compare equal among themselves. The
//! kind order is the same in both directions, so documents lacking the
//! field always sort last.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date_only(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parses an RFC 3339 datetime or a `YYYY-MM-DD` date (as UTC midnight).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_date_only(s).and_then(midnight)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// The half-open span of time a date or datetime string denotes.
///
/// A date covers its whole UTC day; a datetime covers one nanosecond.
/// Comparing spans instead of instants lets `2023-05-10` equal any moment
/// of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Parses `s` as a date or datetime span.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(date) = parse_date_only(s) {
            let start = midnight(date)?;
            let end = start.checked_add_signed(TimeDelta::days(1))?;
            return Some(Self { start, end });
        }
        let start = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
        let end = start.checked_add_signed(TimeDelta::nanoseconds(1))?;
        Some(Self { start, end })
    }

    /// The spans share at least one instant.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Entirely before `other`.
    pub fn before(&self, other: &Self) -> bool {
        self.end <= other.start
    }

    /// Entirely after `other`.
    pub fn after(&self, other: &Self) -> bool {
        self.start >= other.end
    }
}

/// The comparable projection of one field value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// A JSON number.
    Number(f64),
    /// A string holding a date or datetime.
    Date(DateTime<Utc>),
    /// Any other string.
    Text(String),
    /// Missing, null, boolean, array or map.
    Other,
}

impl SortKey {
    /// Derives the key of `value` (`None` for a missing field).
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Other, Self::Number),
            Some(Value::String(s)) => match parse_datetime(s) {
                Some(dt) => Self::Date(dt),
                None => Self::Text(s.clone()),
            },
            _ => Self::Other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Date(_) => 1,
            Self::Text(_) => 2,
            Self::Other => 3,
        }
    }
}

/// Orders two keys. `ascending = false` reverses the order within a kind.
pub fn compare_sort_keys(a: &SortKey, b: &SortKey, ascending: bool) -> Ordering {
    let by_rank = a.rank().cmp(&b.rank());
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    let ordering = match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Date(x), SortKey::Date(y)) => x.cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        _ => Ordering::Equal,
    };
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}
