//! Presentation date slots and the calendar keys derived from them.
//!
//! The scheduler does not compare absolute timestamps. Two slots are considered the same, if they
//! fall into the same ISO week, on the same weekday, at the same hour (see `SlotKey`). Minutes and
//! seconds are ignored, as presentations are planned on an hourly grid.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in time offered for a final presentation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateSlot(pub NaiveDateTime);

impl DateSlot {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        DateSlot(timestamp)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.0
    }

    /// ISO 8601 week number (1..=53)
    pub fn week(&self) -> u32 {
        self.0.iso_week().week()
    }

    /// Day of the week, counted from Monday = 1 to Sunday = 7
    pub fn weekday(&self) -> u32 {
        self.0.weekday().number_from_monday()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            week: self.week(),
            weekday: self.weekday(),
            hour: self.hour(),
        }
    }

    pub fn day(&self) -> DayKey {
        self.key().day()
    }
}

impl fmt::Display for DateSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// Scheduling identity of a date slot: (ISO week, weekday, hour)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub week: u32,
    pub weekday: u32,
    pub hour: u32,
}

impl SlotKey {
    pub fn day(&self) -> DayKey {
        DayKey {
            week: self.week,
            weekday: self.weekday,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "w{}d{}h{}", self.week, self.weekday, self.hour)
    }
}

/// A calendar day bucket: the unit evaluators have to show up for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub week: u32,
    pub weekday: u32,
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "w{}d{}", self.week, self.weekday)
    }
}
