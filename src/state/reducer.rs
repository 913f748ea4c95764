//! Planner state and its pure transitions.
//!
//! # Model
//!
//! `PlannerState` is a best-effort mirror of the three collections plus
//! the pending-operation ledger. It is never authoritative: every
//! transition is driven by a store response (or an optimistic create) and
//! a re-fetch replaces it wholesale.
//!
//! `reduce(state, action) -> state` is pure, so optimistic updates and
//! reconciliation can be tested without any store or timing.

use super::{CorrelationId, PendingLedger};
use crate::models::{AllerleiGroup, WeeklyLesson, YearlyLesson};

/// Mirrored planner state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerState {
    /// Confirmed catalog entries.
    pub entries: Vec<YearlyLesson>,
    /// Weekly lessons of the loaded weeks.
    pub lessons: Vec<WeeklyLesson>,
    /// Merge groups.
    pub groups: Vec<AllerleiGroup>,
    /// Optimistic catalog creates awaiting the store.
    pub pending: PendingLedger<YearlyLesson>,
}

impl PlannerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmed entries followed by pending temporary entries.
    pub fn visible_entries(&self) -> Vec<&YearlyLesson> {
        self.entries
            .iter()
            .chain(self.pending.iter().map(|(_, temp)| temp))
            .collect()
    }

    pub fn entry(&self, id: &str) -> Option<&YearlyLesson> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn lesson(&self, id: &str) -> Option<&WeeklyLesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    /// Loaded lessons of one week.
    pub fn lessons_in_week(&self, week_number: u32) -> Vec<&WeeklyLesson> {
        self.lessons
            .iter()
            .filter(|l| l.week_number == week_number)
            .collect()
    }
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace all catalog entries with a fresh fetch.
    EntriesLoaded(Vec<YearlyLesson>),
    /// Replace the lessons of one week with a fresh fetch.
    WeekLoaded {
        week_number: u32,
        lessons: Vec<WeeklyLesson>,
    },
    EntryUpserted(YearlyLesson),
    EntryRemoved(String),
    LessonUpserted(WeeklyLesson),
    LessonRemoved(String),
    GroupUpserted(AllerleiGroup),
    GroupRemoved(String),
    /// An optimistic create was issued.
    PendingBegun {
        op: CorrelationId,
        temp: YearlyLesson,
    },
    /// The store returned the created entry; it replaces the temporary one.
    PendingConfirmed {
        op: CorrelationId,
        entry: YearlyLesson,
    },
    /// The optimistic create failed; the temporary entry disappears.
    PendingDiscarded { op: CorrelationId },
}

fn upsert_by<T>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> &str) {
    match items.iter().position(|x| id_of(x) == id_of(&item)) {
        Some(i) => items[i] = item,
        None => items.push(item),
    }
}

/// Applies an action to a state, returning the next state.
pub fn reduce(mut state: PlannerState, action: Action) -> PlannerState {
    match action {
        Action::EntriesLoaded(entries) => state.entries = entries,
        Action::WeekLoaded {
            week_number,
            lessons,
        } => {
            state.lessons.retain(|l| l.week_number != week_number);
            state.lessons.extend(lessons);
        }
        Action::EntryUpserted(entry) => upsert_by(&mut state.entries, entry, |e| &e.id),
        Action::EntryRemoved(id) => state.entries.retain(|e| e.id != id),
        Action::LessonUpserted(lesson) => upsert_by(&mut state.lessons, lesson, |l| &l.id),
        Action::LessonRemoved(id) => state.lessons.retain(|l| l.id != id),
        Action::GroupUpserted(group) => upsert_by(&mut state.groups, group, |g| &g.id),
        Action::GroupRemoved(id) => state.groups.retain(|g| g.id != id),
        Action::PendingBegun { op, temp } => state.pending.begin(op, temp),
        Action::PendingConfirmed { op, entry } => {
            // Unknown ops were already discarded; the store still holds the entry.
            state.pending.settle(op);
            upsert_by(&mut state.entries, entry, |e| &e.id);
        }
        Action::PendingDiscarded { op } => {
            state.pending.settle(op);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday;

    fn entry(id: &str, n: u32) -> YearlyLesson {
        YearlyLesson::new(id, "math", 4, n).with_class("A")
    }

    #[test]
    fn test_upsert_and_remove() {
        let s = reduce(PlannerState::new(), Action::EntryUpserted(entry("a", 1)));
        let s = reduce(s, Action::EntryUpserted(entry("a", 2)));
        assert_eq!(s.entries.len(), 1);
        assert_eq!(s.entries[0].lesson_number, 2);

        let s = reduce(s, Action::EntryRemoved("a".into()));
        assert!(s.entries.is_empty());
    }

    #[test]
    fn test_pending_confirm_replaces_temp() {
        let op = CorrelationId::new();
        let temp = entry(&op.temp_record_id(), 3);
        let s = reduce(PlannerState::new(), Action::PendingBegun { op, temp });
        assert_eq!(s.visible_entries().len(), 1);
        assert!(s.entries.is_empty());

        let s = reduce(
            s,
            Action::PendingConfirmed {
                op,
                entry: entry("srv1", 3),
            },
        );
        let visible: Vec<&str> = s.visible_entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(visible, vec!["srv1"]);
        assert!(s.pending.is_empty());
    }

    #[test]
    fn test_pending_discard_removes_temp() {
        let op = CorrelationId::new();
        let s = reduce(
            PlannerState::new(),
            Action::PendingBegun {
                op,
                temp: entry(&op.temp_record_id(), 3),
            },
        );
        let s = reduce(s, Action::PendingDiscarded { op });
        assert!(s.visible_entries().is_empty());
    }

    #[test]
    fn test_week_loaded_replaces_only_that_week() {
        let s = PlannerState {
            lessons: vec![
                WeeklyLesson::new("w1", Weekday::Monday, 1, 1),
                WeeklyLesson::new("w2", Weekday::Monday, 1, 2),
            ],
            ..Default::default()
        };
        let s = reduce(
            s,
            Action::WeekLoaded {
                week_number: 2,
                lessons: vec![WeeklyLesson::new("w2b", Weekday::Friday, 3, 2)],
            },
        );
        assert_eq!(s.lessons_in_week(1).len(), 1);
        assert_eq!(s.lessons_in_week(2)[0].id, "w2b");
    }

    #[test]
    fn test_reduce_is_pure() {
        let before = PlannerState {
            entries: vec![entry("a", 1)],
            ..Default::default()
        };
        let after = reduce(before.clone(), Action::EntryRemoved("a".into()));
        assert_eq!(before.entries.len(), 1);
        assert!(after.entries.is_empty());
    }
}
