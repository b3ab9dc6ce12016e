use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WeeklyBucket {
    iso_year: i32,
    week: u32,
}

impl WeeklyBucket {
    pub(crate) fn new(iso_year: i32, week: u32) -> Self {
        Self { iso_year, week }
    }

    pub(crate) fn of(timestamp: NaiveDateTime) -> Self {
        let iso = timestamp.date().iso_week();
        Self::new(iso.year(), iso.week())
    }

    pub(crate) fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WeeklyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.iso_year, self.week)
    }
}

impl Serialize for WeeklyBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Offsets are kept as published: the bucket follows the wall-clock date of
// the timestamp, not its UTC date.
pub(crate) fn parse_published_at(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_local());
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
