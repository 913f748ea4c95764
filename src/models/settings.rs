//! Timetable settings and wall-clock derivation.
//!
//! Period start/end times are derived, never stored authoritatively:
//! each period starts after all earlier periods plus the break that
//! follows each of them.
//!
//! # Break Table
//! After period `k` comes exactly one break:
//! - the morning break if `k == morning_break_after`,
//! - the lunch break if `k == lunch_break_after`,
//! - the afternoon break if `k == afternoon_break_after`,
//! - otherwise the short break.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

/// School-day timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableSettings {
    /// Start of period 1.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Lesson length (minutes).
    pub lesson_duration: u32,
    /// Break between ordinary periods (minutes).
    pub short_break: u32,
    /// Period after which the morning break starts.
    pub morning_break_after: u32,
    /// Morning break length (minutes).
    pub morning_break_duration: u32,
    /// Period after which the lunch break starts.
    pub lunch_break_after: u32,
    /// Lunch break length (minutes).
    pub lunch_break_duration: u32,
    /// Period after which the afternoon break starts.
    pub afternoon_break_after: u32,
    /// Afternoon break length (minutes).
    pub afternoon_break_duration: u32,
    /// Periods per school day.
    pub lessons_per_day: u32,
}

impl Default for TimetableSettings {
    fn default() -> Self {
        Self {
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            lesson_duration: 45,
            short_break: 5,
            morning_break_after: 2,
            morning_break_duration: 20,
            lunch_break_after: 4,
            lunch_break_duration: 45,
            afternoon_break_after: 6,
            afternoon_break_duration: 10,
            lessons_per_day: 8,
        }
    }
}

impl TimetableSettings {
    /// Break length following period `period` (minutes).
    pub fn break_after(&self, period: u32) -> u32 {
        if period == self.morning_break_after {
            self.morning_break_duration
        } else if period == self.lunch_break_after {
            self.lunch_break_duration
        } else if period == self.afternoon_break_after {
            self.afternoon_break_duration
        } else {
            self.short_break
        }
    }

    /// Start time of a period (1-based). `None` for period 0.
    pub fn period_start(&self, period: u32) -> Option<NaiveTime> {
        if period == 0 {
            return None;
        }
        let offset: u32 = (1..period)
            .map(|k| self.lesson_duration + self.break_after(k))
            .sum();
        Some(self.start_time + Duration::minutes(i64::from(offset)))
    }

    /// Start and end of a lesson spanning `span` periods from `period`.
    pub fn lesson_times(&self, period: u32, span: u32) -> Option<(NaiveTime, NaiveTime)> {
        let start = self.period_start(period)?;
        let last = self.period_start(period + span.max(1) - 1)?;
        let end = last + Duration::minutes(i64::from(self.lesson_duration));
        Some((start, end))
    }
}

/// Serde adapter for "HH:MM" times (seconds are accepted on input).
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
