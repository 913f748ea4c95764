//! Merged ("Allerlei") lesson group.
//!
//! A group records which catalog entries were merged into one visible
//! weekly block, and a snapshot of each entry's display metadata taken
//! before the merge so that unlinking restores it exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{TeachingStep, Weekday, YearlyLesson};

/// Display metadata of a catalog entry captured at merge time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub original_name: String,
    pub original_notes: String,
    pub original_steps: Vec<TeachingStep>,
}

impl EntrySnapshot {
    /// Captures the snapshot of an entry.
    pub fn capture(entry: &YearlyLesson) -> Self {
        Self {
            original_name: entry.name.clone(),
            original_notes: entry.notes.clone(),
            original_steps: entry.steps.clone(),
        }
    }
}

/// A merged lesson group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllerleiGroup {
    /// Record identifier (assigned by the store).
    pub id: String,
    /// Entry whose lesson hosts the merged block.
    pub primary_yearly_lesson_id: String,
    /// Donor entries, in selection order.
    pub added_yearly_lesson_ids: Vec<String>,
    /// Calendar week of the merge.
    pub week_number: u32,
    /// The visible merged block on the grid.
    pub block_lesson_id: Option<String>,
    /// Block position, used to re-seat the primary on unlink.
    pub block_day: Option<Weekday>,
    pub block_period: Option<u32>,
    /// Pre-merge metadata keyed by entry id.
    pub snapshots: BTreeMap<String, EntrySnapshot>,
}

impl AllerleiGroup {
    /// Creates a group for a primary entry and its donors.
    pub fn new(
        primary_yearly_lesson_id: impl Into<String>,
        added_yearly_lesson_ids: Vec<String>,
        week_number: u32,
    ) -> Self {
        Self {
            id: String::new(),
            primary_yearly_lesson_id: primary_yearly_lesson_id.into(),
            added_yearly_lesson_ids,
            week_number,
            block_lesson_id: None,
            block_day: None,
            block_period: None,
            snapshots: BTreeMap::new(),
        }
    }

    /// All member entry ids, primary first.
    pub fn member_ids(&self) -> Vec<&str> {
        std::iter::once(self.primary_yearly_lesson_id.as_str())
            .chain(self.added_yearly_lesson_ids.iter().map(String::as_str))
            .collect()
    }

    /// Whether the entry is the group's primary.
    pub fn is_primary(&self, yearly_lesson_id: &str) -> bool {
        self.primary_yearly_lesson_id == yearly_lesson_id
    }

    /// Snapshot for a member entry.
    pub fn snapshot(&self, yearly_lesson_id: &str) -> Option<&EntrySnapshot> {
        self.snapshots.get(yearly_lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_ids_primary_first() {
        let g = AllerleiGroup::new("p", vec!["d1".into(), "d2".into()], 5);
        assert_eq!(g.member_ids(), vec!["p", "d1", "d2"]);
        assert!(g.is_primary("p"));
        assert!(!g.is_primary("d1"));
    }

    #[test]
    fn test_snapshot_capture() {
        let e = YearlyLesson::new("y1", "math", 1, 3)
            .with_notes("x")
            .with_step(TeachingStep::new("s", "intro"));
        let snap = EntrySnapshot::capture(&e);
        assert_eq!(snap.original_name, "Lektion 3");
        assert_eq!(snap.original_notes, "x");
        assert_eq!(snap.original_steps, e.steps);
    }
}
