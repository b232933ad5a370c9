//! Peak scheduling: which part of the day we are in.
//!
//! Meals are released at known times; around those the automaton reloads
//! faster. The classification only changes cadence and colors, never what
//! the automaton does.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const IDLE_LABEL: &str = "Off-peak";

/// Minutes since midnight, written `"HH:MM"` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub const fn hm(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn of(time: &NaiveDateTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl TryFrom<String> for MinuteOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (h, m) = value
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {:?}", value))?;
        let hour: u16 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid hour in {:?}", value))?;
        let minute: u16 = m
            .trim()
            .parse()
            .map_err(|_| format!("invalid minute in {:?}", value))?;
        if hour > 23 || minute > 59 {
            return Err(format!("{:?} is not a time of day", value));
        }
        Ok(Self::hm(hour, minute))
    }
}

impl From<MinuteOfDay> for String {
    fn from(value: MinuteOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// A peak window: `[start, end]`, inclusive on both ends.
///
/// A window whose `start` is later than its `end` wraps past midnight.
/// An empty `weekdays` list means every day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub label: String,
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekdays: Vec<Weekday>,
}

impl PeakWindow {
    pub fn daily(label: &str, start: MinuteOfDay, end: MinuteOfDay) -> Self {
        Self {
            label: label.to_string(),
            start,
            end,
            weekdays: Vec::new(),
        }
    }

    pub fn on(mut self, weekdays: &[Weekday]) -> Self {
        self.weekdays = weekdays.to_vec();
        self
    }

    pub fn contains(&self, now: &NaiveDateTime) -> bool {
        if !self.weekdays.is_empty() && !self.weekdays.contains(&now.weekday()) {
            return false;
        }
        let minute = MinuteOfDay::of(now);
        if self.start <= self.end {
            self.start <= minute && minute <= self.end
        } else {
            minute >= self.start || minute <= self.end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Peak,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub kind: PeriodKind,
    pub label: String,
}

impl Period {
    pub fn idle() -> Self {
        Self {
            kind: PeriodKind::Idle,
            label: IDLE_LABEL.to_string(),
        }
    }

    pub fn is_peak(&self) -> bool {
        self.kind == PeriodKind::Peak
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PeriodKind::Peak => "PEAK",
            PeriodKind::Idle => "IDLE",
        };
        write!(f, "{} ({})", kind, self.label)
    }
}

/// Classifies `now` against the window table; the first matching window wins.
pub fn classify_period(now: &NaiveDateTime, windows: &[PeakWindow]) -> Period {
    windows
        .iter()
        .find(|w| w.contains(now))
        .map(|w| Period {
            kind: PeriodKind::Peak,
            label: w.label.clone(),
        })
        .unwrap_or_else(Period::idle)
}
