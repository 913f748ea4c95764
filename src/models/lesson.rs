//! Weekly lesson (grid instance) model.
//!
//! A weekly lesson is the concrete placement of a catalog entry on the
//! recurring grid: a weekday, a period and a calendar week.
//!
//! # Occupancy
//! Only visible lessons (`is_hidden == false`) occupy slots. A double
//! lesson occupies `period_slot` and `period_slot + 1` on the same day.
//! Hidden lessons are donors absorbed into a merged lesson and never
//! count for slot occupancy.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::Weekday;

/// A lesson placed on the weekly grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyLesson {
    /// Record identifier (assigned by the store).
    pub id: String,
    /// School day.
    pub day_of_week: Weekday,
    /// First period occupied (1-based).
    pub period_slot: u32,
    /// Calendar week.
    pub week_number: u32,
    /// Backing catalog entry.
    pub yearly_lesson_id: Option<String>,
    /// Second half of a double lesson.
    pub second_yearly_lesson_id: Option<String>,
    /// Whether this lesson spans two periods.
    pub is_double_lesson: bool,
    /// Number of periods occupied (1 or 2).
    pub period_span: u32,
    /// Hidden donor of a merged lesson.
    pub is_hidden: bool,
    /// Topic copied from the catalog entry.
    pub topic_id: Option<String>,
    /// Subject display name.
    pub subject: String,
    /// Derived wall-clock start. Not authoritative.
    pub start_time: Option<NaiveTime>,
    /// Derived wall-clock end. Not authoritative.
    pub end_time: Option<NaiveTime>,
    /// Whether this lesson is a merged (Allerlei) block.
    pub is_allerlei: bool,
    /// Subjects merged into this block.
    pub allerlei_subjects: Vec<String>,
}

impl WeeklyLesson {
    /// Creates a single-period visible lesson.
    pub fn new(id: impl Into<String>, day_of_week: Weekday, period_slot: u32, week_number: u32) -> Self {
        Self {
            id: id.into(),
            day_of_week,
            period_slot,
            week_number,
            yearly_lesson_id: None,
            second_yearly_lesson_id: None,
            is_double_lesson: false,
            period_span: 1,
            is_hidden: false,
            topic_id: None,
            subject: String::new(),
            start_time: None,
            end_time: None,
            is_allerlei: false,
            allerlei_subjects: Vec::new(),
        }
    }

    /// Links the lesson to a catalog entry.
    pub fn with_yearly_lesson(mut self, yearly_lesson_id: impl Into<String>) -> Self {
        self.yearly_lesson_id = Some(yearly_lesson_id.into());
        self
    }

    /// Sets the subject display name.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Makes the lesson a double lesson.
    pub fn as_double(mut self, second_yearly_lesson_id: Option<String>) -> Self {
        self.is_double_lesson = true;
        self.period_span = 2;
        self.second_yearly_lesson_id = second_yearly_lesson_id;
        self
    }

    /// Marks the lesson hidden.
    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    /// Number of periods this lesson occupies.
    #[inline]
    pub fn span(&self) -> u32 {
        if self.is_double_lesson {
            self.period_span.max(2)
        } else {
            self.period_span.max(1)
        }
    }

    /// Whether this lesson counts for slot occupancy.
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.is_hidden
    }

    /// Whether this lesson occupies the given period of its day.
    #[inline]
    pub fn covers(&self, period: u32) -> bool {
        period >= self.period_slot && period < self.period_slot + self.span()
    }

    /// Whether this visible lesson occupies (day, period, week).
    pub fn occupies(&self, day: Weekday, period: u32, week_number: u32) -> bool {
        self.is_visible()
            && self.week_number == week_number
            && self.day_of_week == day
            && self.covers(period)
    }

    /// Whether this lesson references the catalog entry, as primary or second half.
    pub fn references(&self, yearly_lesson_id: &str) -> bool {
        self.yearly_lesson_id.as_deref() == Some(yearly_lesson_id)
            || self.second_yearly_lesson_id.as_deref() == Some(yearly_lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_occupancy() {
        let l = WeeklyLesson::new("l1", Weekday::Monday, 3, 10);
        assert!(l.occupies(Weekday::Monday, 3, 10));
        assert!(!l.occupies(Weekday::Monday, 4, 10));
        assert!(!l.occupies(Weekday::Monday, 3, 11));
        assert!(!l.occupies(Weekday::Tuesday, 3, 10));
    }

    #[test]
    fn test_double_occupancy() {
        let l = WeeklyLesson::new("l1", Weekday::Monday, 3, 10).as_double(None);
        assert_eq!(l.span(), 2);
        assert!(l.occupies(Weekday::Monday, 3, 10));
        assert!(l.occupies(Weekday::Monday, 4, 10));
        assert!(!l.occupies(Weekday::Monday, 5, 10));
    }

    #[test]
    fn test_hidden_never_occupies() {
        let l = WeeklyLesson::new("l1", Weekday::Monday, 3, 10).hidden();
        assert!(!l.occupies(Weekday::Monday, 3, 10));
    }

    #[test]
    fn test_references() {
        let l = WeeklyLesson::new("l1", Weekday::Monday, 1, 1)
            .with_yearly_lesson("y1")
            .as_double(Some("y2".into()));
        assert!(l.references("y1"));
        assert!(l.references("y2"));
        assert!(!l.references("y3"));
    }
}
