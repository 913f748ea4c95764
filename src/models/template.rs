//! Recurring weekly timetable template.
//!
//! The template assigns `(subject, class)` pairs to periods of each
//! weekday, independent of any particular calendar week. It is a
//! read-only input to the scheduling engine.
//!
//! # Slot Sequence
//! For a `(subject, class)` pair, the *slot sequence* is every template
//! slot of that pair, sorted by (weekday order, period). The n-th catalog
//! entry of the week is placed on the n-th slot of this sequence.
//!
//! # Double Lessons
//! A slot at period `p` is the first half of a *structural* double lesson
//! iff the same day also has a slot for the same subject and class at
//! period `p + 1`. Subject and class must both match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Weekday;

/// One period of the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSlot {
    /// Period (1-based).
    pub period: u32,
    /// Subject display name.
    pub subject: String,
    /// Class taught.
    pub class_id: String,
}

impl TemplateSlot {
    /// Creates a template slot.
    pub fn new(period: u32, subject: impl Into<String>, class_id: impl Into<String>) -> Self {
        Self {
            period,
            subject: subject.into(),
            class_id: class_id.into(),
        }
    }

    #[inline]
    fn matches(&self, subject: &str, class_id: &str) -> bool {
        self.subject == subject && self.class_id == class_id
    }
}

/// A concrete (day, period) position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// School day.
    pub day: Weekday,
    /// Period (1-based).
    pub period: u32,
}

impl SlotRef {
    /// Creates a slot reference.
    pub fn new(day: Weekday, period: u32) -> Self {
        Self { day, period }
    }
}

/// Weekly template: per-weekday slot assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    /// Slots per weekday.
    pub days: BTreeMap<Weekday, Vec<TemplateSlot>>,
}

impl ScheduleTemplate {
    /// Creates an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slot on a weekday.
    pub fn with_slot(
        mut self,
        day: Weekday,
        period: u32,
        subject: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        self.add_slot(day, TemplateSlot::new(period, subject, class_id));
        self
    }

    /// Adds a slot on a weekday.
    pub fn add_slot(&mut self, day: Weekday, slot: TemplateSlot) {
        self.days.entry(day).or_default().push(slot);
    }

    /// Slots of a weekday (empty if none).
    pub fn slots_on(&self, day: Weekday) -> &[TemplateSlot] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The slot sequence of a `(subject, class)` pair, sorted by (weekday, period).
    pub fn slot_sequence(&self, subject: &str, class_id: &str) -> Vec<SlotRef> {
        let mut sequence: Vec<SlotRef> = Weekday::ALL
            .iter()
            .flat_map(|&day| {
                self.slots_on(day)
                    .iter()
                    .filter(move |s| s.matches(subject, class_id))
                    .map(move |s| SlotRef::new(day, s.period))
            })
            .collect();
        sequence.sort();
        sequence.dedup();
        sequence
    }

    /// Whether `slot` starts a structural double lesson for the pair.
    pub fn is_double_start(&self, slot: SlotRef, subject: &str, class_id: &str) -> bool {
        self.slots_on(slot.day)
            .iter()
            .any(|s| s.period == slot.period + 1 && s.matches(subject, class_id))
    }

    /// Whether `slot` is the second half of a structural double lesson for the pair.
    pub fn is_double_end(&self, slot: SlotRef, subject: &str, class_id: &str) -> bool {
        slot.period > 1
            && self
                .slots_on(slot.day)
                .iter()
                .any(|s| s.period + 1 == slot.period && s.matches(subject, class_id))
    }

    /// Highest period used on any day; the allocator's search bound.
    pub fn max_period(&self) -> u32 {
        self.days
            .values()
            .flat_map(|slots| slots.iter().map(|s| s.period))
            .max()
            .unwrap_or(0)
    }

    /// Distinct `(subject, class)` pairs, in first-seen canonical order.
    pub fn subject_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for day in Weekday::ALL {
            for slot in self.slots_on(day) {
                let pair = (slot.subject.clone(), slot.class_id.clone());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    /// Whether the template has no slots.
    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }
}
