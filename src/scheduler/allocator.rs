//! Free-slot search on a week's grid.
//!
//! # Algorithm
//!
//! 1. Scan the preferred day from the preferred period up to the
//!    template's slot count.
//! 2. Scan each following weekday (canonical order) from period 1.
//! 3. Wrap around: scan the weekdays before the preferred day from period 1.
//!
//! A slot is free when no *visible* lesson of the week covers it; hidden
//! donor lessons never block a slot. A fully booked week yields `None`,
//! which callers treat as "no placement possible".
//!
//! # Complexity
//! O(d * p) lookups where d = 5 weekdays, p = slot count.

use std::collections::HashSet;

use crate::models::{SlotRef, WeeklyLesson, Weekday};

/// Occupied (day, period) cells of one calendar week.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyGrid {
    week_number: u32,
    taken: HashSet<(Weekday, u32)>,
}

impl OccupancyGrid {
    /// An empty grid for a week.
    pub fn empty(week_number: u32) -> Self {
        Self {
            week_number,
            taken: HashSet::new(),
        }
    }

    /// Builds the grid from the visible lessons of `week_number`.
    pub fn for_week(lessons: &[WeeklyLesson], week_number: u32) -> Self {
        let mut grid = Self::empty(week_number);
        for lesson in lessons
            .iter()
            .filter(|l| l.is_visible() && l.week_number == week_number)
        {
            grid.occupy(lesson.day_of_week, lesson.period_slot, lesson.span());
        }
        grid
    }

    /// Calendar week of this grid.
    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    /// Whether one cell is free.
    #[inline]
    pub fn is_free(&self, day: Weekday, period: u32) -> bool {
        !self.taken.contains(&(day, period))
    }

    /// Whether `span` consecutive cells starting at `period` are free.
    pub fn is_available(&self, day: Weekday, period: u32, span: u32) -> bool {
        (period..period + span.max(1)).all(|p| self.is_free(day, p))
    }

    /// Marks cells as taken.
    pub fn occupy(&mut self, day: Weekday, period: u32, span: u32) {
        for p in period..period + span.max(1) {
            self.taken.insert((day, p));
        }
    }

    /// Marks cells as free.
    pub fn release(&mut self, day: Weekday, period: u32, span: u32) {
        for p in period..period + span.max(1) {
            self.taken.remove(&(day, p));
        }
    }

    /// Number of taken cells.
    pub fn occupied_count(&self) -> usize {
        self.taken.len()
    }

    fn scan_day(&self, day: Weekday, from: u32, slot_count: u32, span: u32) -> Option<SlotRef> {
        let span = span.max(1);
        (from.max(1)..=slot_count)
            .take_while(|p| p + span - 1 <= slot_count)
            .find(|&p| self.is_available(day, p, span))
            .map(|p| SlotRef::new(day, p))
    }

    fn scan_from(
        &self,
        preferred_day: Weekday,
        slot_count: u32,
        first_period: u32,
        span: u32,
    ) -> Option<SlotRef> {
        self.scan_day(preferred_day, first_period, slot_count, span)
            .or_else(|| {
                preferred_day
                    .following()
                    .iter()
                    .find_map(|&day| self.scan_day(day, 1, slot_count, span))
            })
            .or_else(|| {
                preferred_day
                    .preceding()
                    .iter()
                    .find_map(|&day| self.scan_day(day, 1, slot_count, span))
            })
    }

    /// First free slot from (`preferred_day`, `preferred_period`), falling back
    /// to later weekdays, then earlier ones.
    pub fn find_free(
        &self,
        preferred_day: Weekday,
        slot_count: u32,
        preferred_period: u32,
        span: u32,
    ) -> Option<SlotRef> {
        self.scan_from(preferred_day, slot_count, preferred_period, span)
    }

    /// Like [`find_free`](Self::find_free), but starts two periods after
    /// `preferred_period`, skipping the period that belonged to a just
    /// vacated double lesson.
    pub fn find_alternative(
        &self,
        preferred_day: Weekday,
        slot_count: u32,
        preferred_period: u32,
        span: u32,
    ) -> Option<SlotRef> {
        self.scan_from(preferred_day, slot_count, preferred_period + 2, span)
    }
}

/// Finds a free single-period slot in `week_number`.
///
/// Returns `None` when the week is fully booked.
pub fn find_free_slot(
    lessons: &[WeeklyLesson],
    preferred_day: Weekday,
    slot_count: u32,
    week_number: u32,
    preferred_period: u32,
) -> Option<SlotRef> {
    OccupancyGrid::for_week(lessons, week_number).find_free(
        preferred_day,
        slot_count,
        preferred_period,
        1,
    )
}

/// Finds a free slot when resolving a conflict at `preferred_period`.
///
/// Scanning starts at `preferred_period + 2` on the preferred day before
/// falling through to the other weekdays.
pub fn find_alternative_slot(
    lessons: &[WeeklyLesson],
    preferred_day: Weekday,
    slot_count: u32,
    week_number: u32,
    preferred_period: u32,
) -> Option<SlotRef> {
    OccupancyGrid::for_week(lessons, week_number).find_alternative(
        preferred_day,
        slot_count,
        preferred_period,
        1,
    )
}

/// Whether a lesson fits at (day, period) in `week_number`.
///
/// A double lesson needs both `period` and `period + 1` free.
pub fn is_slot_available(
    lessons: &[WeeklyLesson],
    day: Weekday,
    period: u32,
    week_number: u32,
    is_double: bool,
) -> bool {
    let span = if is_double { 2 } else { 1 };
    OccupancyGrid::for_week(lessons, week_number).is_available(day, period, span)
}
