//! Yearly catalog entry model.
//!
//! A yearly lesson is one planned lesson in a subject's year-long
//! sequence. It is independent of the weekly grid: the synchronizer
//! derives a [`WeeklyLesson`](super::WeeklyLesson) from it.
//!
//! # Ordering
//! For a fixed (subject, week, class), `lesson_number` values form a dense
//! sequence starting at 1. The number doubles as the index into the
//! subject's template slot sequence.

use serde::{Deserialize, Serialize};

/// Highest calendar week a catalog entry may be planned for.
pub const WEEKS_PER_YEAR: u32 = 52;

/// One teaching step of a lesson plan (phase, method, material).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingStep {
    /// Step identifier.
    pub id: String,
    /// Planned duration in minutes.
    pub time: Option<u32>,
    /// Social/work form (e.g. "plenary", "pairs").
    pub work_form: String,
    /// What happens in this step.
    pub activity: String,
    /// Material used.
    pub material: String,
}

impl TeachingStep {
    /// Creates a step with the given activity text.
    pub fn new(id: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activity: activity.into(),
            ..Default::default()
        }
    }
}

/// A planned lesson in the yearly catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyLesson {
    /// Record identifier (assigned by the store).
    pub id: String,
    /// Subject reference (subject id).
    pub subject: String,
    /// Class the lesson is planned for.
    pub class_id: String,
    /// Calendar week (1..=52).
    pub week_number: u32,
    /// Dense ordering key within (subject, week, class), starting at 1.
    pub lesson_number: u32,
    /// School year label (e.g. "2024/25").
    pub school_year: String,
    /// Assigned topic, if any.
    pub topic_id: Option<String>,
    /// Whether this entry is the first half of a double lesson.
    pub is_double_lesson: bool,
    /// Paired second half of a double lesson.
    pub second_yearly_lesson_id: Option<String>,
    /// Whether this entry takes part in a merged (Allerlei) lesson.
    pub is_allerlei: bool,
    /// Subject names of the merged lesson, in selection order.
    pub allerlei_subjects: Vec<String>,
    /// Display name.
    pub name: String,
    /// Free-form notes.
    pub notes: String,
    /// Ordered teaching steps.
    pub steps: Vec<TeachingStep>,
}

impl YearlyLesson {
    /// Creates a catalog entry for the given subject, week and position.
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        week_number: u32,
        lesson_number: u32,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            week_number,
            lesson_number,
            name: default_lesson_name(lesson_number),
            ..Default::default()
        }
    }

    /// Sets the class.
    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = class_id.into();
        self
    }

    /// Sets the school year.
    pub fn with_school_year(mut self, school_year: impl Into<String>) -> Self {
        self.school_year = school_year.into();
        self
    }

    /// Sets the topic.
    pub fn with_topic(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Appends a teaching step.
    pub fn with_step(mut self, step: TeachingStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Marks this entry as the first half of a double lesson.
    pub fn with_second_half(mut self, second_id: impl Into<String>) -> Self {
        self.is_double_lesson = true;
        self.second_yearly_lesson_id = Some(second_id.into());
        self
    }

    /// Whether this entry belongs to the (subject, week, class) group.
    #[inline]
    pub fn in_group(&self, subject: &str, week_number: u32, class_id: &str) -> bool {
        self.subject == subject && self.week_number == week_number && self.class_id == class_id
    }

    /// Whether this entry carries the given topic.
    #[inline]
    pub fn has_topic(&self, topic_id: &str) -> bool {
        self.topic_id.as_deref() == Some(topic_id)
    }
}

/// Name given to freshly planned or synthesized lessons.
pub fn default_lesson_name(lesson_number: u32) -> String {
    format!("Lektion {lesson_number}")
}

/// Catalog entries of one (subject, week, class) group, sorted by lesson number.
pub fn sorted_group<'a>(
    entries: &'a [YearlyLesson],
    subject: &str,
    week_number: u32,
    class_id: &str,
) -> Vec<&'a YearlyLesson> {
    let mut group: Vec<&YearlyLesson> = entries
        .iter()
        .filter(|e| e.in_group(subject, week_number, class_id))
        .collect();
    group.sort_by_key(|e| e.lesson_number);
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let e = YearlyLesson::new("y1", "math", 3, 2)
            .with_class("5a")
            .with_topic("fractions")
            .with_notes("bring rulers")
            .with_step(TeachingStep::new("st1", "warm-up"));

        assert_eq!(e.name, "Lektion 2");
        assert_eq!(e.class_id, "5a");
        assert!(e.has_topic("fractions"));
        assert!(!e.has_topic("geometry"));
        assert_eq!(e.steps.len(), 1);
        assert!(!e.is_double_lesson);
    }

    #[test]
    fn test_with_second_half() {
        let e = YearlyLesson::new("y1", "math", 3, 1).with_second_half("y2");
        assert!(e.is_double_lesson);
        assert_eq!(e.second_yearly_lesson_id.as_deref(), Some("y2"));
    }

    #[test]
    fn test_sorted_group() {
        let entries = vec![
            YearlyLesson::new("c", "math", 3, 3).with_class("A"),
            YearlyLesson::new("a", "math", 3, 1).with_class("A"),
            YearlyLesson::new("x", "math", 4, 1).with_class("A"),
            YearlyLesson::new("b", "math", 3, 2).with_class("A"),
            YearlyLesson::new("z", "math", 3, 1).with_class("B"),
        ];
        let ids: Vec<&str> = sorted_group(&entries, "math", 3, "A")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
