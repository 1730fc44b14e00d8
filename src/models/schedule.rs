use std::fmt;

use jiff::civil::{Date, DateTime, Time};
use serde::{Deserialize, Serialize};

/// Identifier handed out by the backend. Numeric ids are kept in decimal form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// A wall-clock point as entered by the user: a date and an optional time of day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Moment {
    pub date: Option<Date>,
    pub time: Option<Time>,
}

impl Moment {
    /// Civil date-time, using `fallback` when no time of day was given
    pub fn datetime_or(&self, fallback: Time) -> Option<DateTime> {
        self.date
            .map(|date| date.to_datetime(self.time.unwrap_or(fallback)))
    }

    /// Civil date-time, only when both parts are known
    pub fn exact(&self) -> Option<DateTime> {
        match (self.date, self.time) {
            (Some(date), Some(time)) => Some(date.to_datetime(time)),
            _ => None,
        }
    }
}

/// Start and end of a project or phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    pub start: Moment,
    pub end: Moment,
    /// Set when the backend sent date/time values that could not be read.
    /// Such entities carry no weight and get no reminders.
    pub malformed: bool,
}

impl Schedule {
    pub fn new(start: Moment, end: Moment) -> Self {
        Self {
            start,
            end,
            malformed: false,
        }
    }
}

#[cfg(test)]
impl Moment {
    pub fn new(date: Date, time: Time) -> Self {
        Self {
            date: Some(date),
            time: Some(time),
        }
    }

    pub fn date_only(date: Date) -> Self {
        Self {
            date: Some(date),
            time: None,
        }
    }
}
