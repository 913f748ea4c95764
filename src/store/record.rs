//! Typed record shapes for the three collections.
//!
//! Each collection has a fixed record type, a fixed collection name and
//! a typed partial-update (`Patch`) shape, so field names and types are
//! checked at compile time instead of being assembled as loose maps.

use std::fmt::Debug;

use super::FieldValue;
use crate::models::{AllerleiGroup, EntrySnapshot, TeachingStep, WeeklyLesson, Weekday, YearlyLesson};
use chrono::NaiveTime;
use std::collections::BTreeMap;

/// A record stored in a collection.
pub trait Record: Clone + Debug + Send + Sync + 'static {
    /// Collection name in the store.
    const COLLECTION: &'static str;

    /// Partial-update shape.
    type Patch: Clone + Debug + Default + Send + Sync;

    /// Record id.
    fn id(&self) -> &str;

    /// Replaces the record id (used by stores on create).
    fn set_id(&mut self, id: String);

    /// Scalar field value for filtering. `None` for unknown fields.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Applies a partial update in place.
    fn apply(&mut self, patch: &Self::Patch);
}

/// Partial update of a catalog entry. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearlyLessonPatch {
    pub lesson_number: Option<u32>,
    pub topic_id: Option<Option<String>>,
    pub is_double_lesson: Option<bool>,
    pub second_yearly_lesson_id: Option<Option<String>>,
    pub is_allerlei: Option<bool>,
    pub allerlei_subjects: Option<Vec<String>>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub steps: Option<Vec<TeachingStep>>,
}

impl Record for YearlyLesson {
    const COLLECTION: &'static str = "yearly_lessons";
    type Patch = YearlyLessonPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => FieldValue::from(&self.id),
            "subject" => FieldValue::from(&self.subject),
            "class_id" => FieldValue::from(&self.class_id),
            "week_number" => FieldValue::from(self.week_number),
            "lesson_number" => FieldValue::from(self.lesson_number),
            "school_year" => FieldValue::from(&self.school_year),
            "topic_id" => FieldValue::from(self.topic_id.clone()),
            "is_double_lesson" => FieldValue::from(self.is_double_lesson),
            "second_yearly_lesson_id" => FieldValue::from(self.second_yearly_lesson_id.clone()),
            "is_allerlei" => FieldValue::from(self.is_allerlei),
            "name" => FieldValue::from(&self.name),
            "notes" => FieldValue::from(&self.notes),
            _ => return None,
        })
    }

    fn apply(&mut self, patch: &YearlyLessonPatch) {
        if let Some(n) = patch.lesson_number {
            self.lesson_number = n;
        }
        if let Some(ref topic) = patch.topic_id {
            self.topic_id = topic.clone();
        }
        if let Some(d) = patch.is_double_lesson {
            self.is_double_lesson = d;
        }
        if let Some(ref second) = patch.second_yearly_lesson_id {
            self.second_yearly_lesson_id = second.clone();
        }
        if let Some(a) = patch.is_allerlei {
            self.is_allerlei = a;
        }
        if let Some(ref subjects) = patch.allerlei_subjects {
            self.allerlei_subjects = subjects.clone();
        }
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref notes) = patch.notes {
            self.notes = notes.clone();
        }
        if let Some(ref steps) = patch.steps {
            self.steps = steps.clone();
        }
    }
}

impl YearlyLessonPatch {
    /// Restores display metadata from a merge snapshot and clears the merge flags.
    pub fn restore(snapshot: &EntrySnapshot) -> Self {
        Self {
            name: Some(snapshot.original_name.clone()),
            notes: Some(snapshot.original_notes.clone()),
            steps: Some(snapshot.original_steps.clone()),
            is_allerlei: Some(false),
            allerlei_subjects: Some(Vec::new()),
            ..Default::default()
        }
    }
}

/// Partial update of a weekly lesson. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyLessonPatch {
    pub day_of_week: Option<Weekday>,
    pub period_slot: Option<u32>,
    pub yearly_lesson_id: Option<Option<String>>,
    pub second_yearly_lesson_id: Option<Option<String>>,
    pub is_double_lesson: Option<bool>,
    pub period_span: Option<u32>,
    pub is_hidden: Option<bool>,
    pub topic_id: Option<Option<String>>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub is_allerlei: Option<bool>,
    pub allerlei_subjects: Option<Vec<String>>,
}

impl WeeklyLessonPatch {
    /// Patch toggling visibility only.
    pub fn visibility(hidden: bool) -> Self {
        Self {
            is_hidden: Some(hidden),
            ..Default::default()
        }
    }
}

impl Record for WeeklyLesson {
    const COLLECTION: &'static str = "lessons";
    type Patch = WeeklyLessonPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => FieldValue::from(&self.id),
            "day_of_week" => FieldValue::from(self.day_of_week.as_str()),
            "period_slot" => FieldValue::from(self.period_slot),
            "week_number" => FieldValue::from(self.week_number),
            "yearly_lesson_id" => FieldValue::from(self.yearly_lesson_id.clone()),
            "second_yearly_lesson_id" => FieldValue::from(self.second_yearly_lesson_id.clone()),
            "is_double_lesson" => FieldValue::from(self.is_double_lesson),
            "period_span" => FieldValue::from(self.period_span),
            "is_hidden" => FieldValue::from(self.is_hidden),
            "topic_id" => FieldValue::from(self.topic_id.clone()),
            "subject" => FieldValue::from(&self.subject),
            "is_allerlei" => FieldValue::from(self.is_allerlei),
            _ => return None,
        })
    }

    fn apply(&mut self, patch: &WeeklyLessonPatch) {
        if let Some(day) = patch.day_of_week {
            self.day_of_week = day;
        }
        if let Some(period) = patch.period_slot {
            self.period_slot = period;
        }
        if let Some(ref id) = patch.yearly_lesson_id {
            self.yearly_lesson_id = id.clone();
        }
        if let Some(ref id) = patch.second_yearly_lesson_id {
            self.second_yearly_lesson_id = id.clone();
        }
        if let Some(d) = patch.is_double_lesson {
            self.is_double_lesson = d;
        }
        if let Some(span) = patch.period_span {
            self.period_span = span;
        }
        if let Some(h) = patch.is_hidden {
            self.is_hidden = h;
        }
        if let Some(ref topic) = patch.topic_id {
            self.topic_id = topic.clone();
        }
        if let Some(t) = patch.start_time {
            self.start_time = t;
        }
        if let Some(t) = patch.end_time {
            self.end_time = t;
        }
        if let Some(a) = patch.is_allerlei {
            self.is_allerlei = a;
        }
        if let Some(ref subjects) = patch.allerlei_subjects {
            self.allerlei_subjects = subjects.clone();
        }
    }
}

/// Partial update of a merge group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllerleiGroupPatch {
    pub added_yearly_lesson_ids: Option<Vec<String>>,
    pub block_lesson_id: Option<Option<String>>,
    pub snapshots: Option<BTreeMap<String, EntrySnapshot>>,
}

impl Record for AllerleiGroup {
    const COLLECTION: &'static str = "allerlei_groups";
    type Patch = AllerleiGroupPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => FieldValue::from(&self.id),
            "primary_yearly_lesson_id" => FieldValue::from(&self.primary_yearly_lesson_id),
            "week_number" => FieldValue::from(self.week_number),
            "block_lesson_id" => FieldValue::from(self.block_lesson_id.clone()),
            _ => return None,
        })
    }

    fn apply(&mut self, patch: &AllerleiGroupPatch) {
        if let Some(ref ids) = patch.added_yearly_lesson_ids {
            self.added_yearly_lesson_ids = ids.clone();
        }
        if let Some(ref block) = patch.block_lesson_id {
            self.block_lesson_id = block.clone();
        }
        if let Some(ref snapshots) = patch.snapshots {
            self.snapshots = snapshots.clone();
        }
    }
}
