//! Integrity checks for catalogs, grids and merge selections.
//!
//! Detects:
//! - Duplicate entry ids and duplicate lesson numbers within a
//!   (subject, week, class) group
//! - Lesson numbers below 1 and weeks outside 1..=52
//! - Double lessons pointing at a missing second half
//! - Topic runs with holes (lesson #2 and #4 share a topic, #3 does not)
//! - Two visible weekly lessons on the same (day, period, week)
//! - Invalid merge selections
//!
//! All checks collect every finding instead of stopping at the first.

use log::warn;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{WeeklyLesson, Weekday, YearlyLesson, WEEKS_PER_YEAR};
use crate::planning::AllerleiSelection;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A merge has no primary lesson.
    NoPrimarySelected,
    /// A merge selects no subjects.
    EmptySelection,
    /// A selected subject has no catalog entry assigned.
    MissingAssignment,
    /// The same entry appears twice (in a merge, or as a record id).
    DuplicateEntry,
    /// A referenced catalog entry does not exist.
    UnknownEntry,
    /// An operation needs a topic but none was given.
    TopicRequired,
    /// A merge group does not exist.
    GroupNotFound,
    /// Two entries share a lesson number within one group.
    DuplicateLessonNumber,
    /// Lesson number below 1.
    InvalidLessonNumber,
    /// Week outside 1..=52.
    InvalidWeek,
    /// A double lesson's second half does not exist.
    DanglingSecondLesson,
    /// A topic's lesson numbers have a hole.
    NonContiguousTopic,
    /// Two visible lessons occupy one slot.
    SlotConflict,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates catalog entries.
///
/// Checks:
/// 1. No duplicate entry ids
/// 2. Weeks within 1..=52
/// 3. Lesson numbers ≥ 1
/// 4. No duplicate lesson number within (subject, week, class)
/// 5. Every declared second half exists
pub fn validate_catalog(entries: &[YearlyLesson]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut ids = HashSet::new();
    for e in entries {
        if !ids.insert(e.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateEntry,
                format!("Duplicate catalog entry ID: {}", e.id),
            ));
        }
    }

    let mut numbers: HashMap<(&str, u32, &str), HashSet<u32>> = HashMap::new();
    for e in entries {
        if e.week_number == 0 || e.week_number > WEEKS_PER_YEAR {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidWeek,
                format!("Entry '{}' planned for week {}", e.id, e.week_number),
            ));
        }
        if e.lesson_number == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidLessonNumber,
                format!("Entry '{}' has lesson number 0", e.id),
            ));
        }
        let seen = numbers
            .entry((e.subject.as_str(), e.week_number, e.class_id.as_str()))
            .or_default();
        if !seen.insert(e.lesson_number) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateLessonNumber,
                format!(
                    "Lesson number {} used twice for subject '{}' in week {} (class '{}')",
                    e.lesson_number, e.subject, e.week_number, e.class_id
                ),
            ));
        }
        if let Some(ref second) = e.second_yearly_lesson_id {
            if !ids.contains(second.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DanglingSecondLesson,
                    format!("Entry '{}' pairs with missing entry '{}'", e.id, second),
                ));
            }
        }
    }

    finish(errors)
}

/// Validates that each topic's lesson numbers form a contiguous run
/// within its (subject, week, class) group.
pub fn validate_topic_runs(entries: &[YearlyLesson]) -> ValidationResult {
    let mut runs: BTreeMap<(&str, u32, &str, &str), Vec<u32>> = BTreeMap::new();
    for e in entries {
        if let Some(ref topic) = e.topic_id {
            runs.entry((
                e.subject.as_str(),
                e.week_number,
                e.class_id.as_str(),
                topic.as_str(),
            ))
            .or_default()
            .push(e.lesson_number);
        }
    }

    let mut errors = Vec::new();
    for ((subject, week, class_id, topic), mut numbers) in runs {
        numbers.sort_unstable();
        numbers.dedup();
        let (Some(&min), Some(&max)) = (numbers.first(), numbers.last()) else {
            continue;
        };
        let expected = (max - min + 1) as usize;
        if numbers.len() != expected {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonContiguousTopic,
                format!(
                    "Topic '{}' of subject '{}' in week {} (class '{}') covers {:?}, expected {}..={}",
                    topic, subject, week, class_id, numbers, min, max
                ),
            ));
        }
    }

    finish(errors)
}

/// Validates that no two visible lessons share a (day, period, week).
///
/// Both periods of a double lesson count as occupied.
pub fn validate_slot_occupancy(lessons: &[WeeklyLesson]) -> ValidationResult {
    let mut owners: HashMap<(u32, Weekday, u32), &str> = HashMap::new();
    let mut errors = Vec::new();

    for lesson in lessons.iter().filter(|l| l.is_visible()) {
        for period in lesson.period_slot..lesson.period_slot + lesson.span() {
            let key = (lesson.week_number, lesson.day_of_week, period);
            if let Some(other) = owners.insert(key, lesson.id.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SlotConflict,
                    format!(
                        "Lessons '{}' and '{}' both occupy {} period {} in week {}",
                        other, lesson.id, lesson.day_of_week, period, lesson.week_number
                    ),
                ));
            }
        }
    }

    finish(errors)
}

/// Validates a merge request before any mutation.
///
/// Checks:
/// 1. A primary entry is given and exists
/// 2. At least one subject is selected
/// 3. Every selected subject has a catalog entry assigned, and it exists
/// 4. No entry appears twice (including the primary)
pub fn validate_allerlei_selection(
    primary_id: Option<&str>,
    selections: &[AllerleiSelection],
    catalog: &[YearlyLesson],
) -> ValidationResult {
    let mut errors = Vec::new();
    let known: HashSet<&str> = catalog.iter().map(|e| e.id.as_str()).collect();

    match primary_id {
        None => errors.push(ValidationError::new(
            ValidationErrorKind::NoPrimarySelected,
            "No primary lesson selected for the merged lesson",
        )),
        Some(id) if !known.contains(id) => errors.push(ValidationError::new(
            ValidationErrorKind::UnknownEntry,
            format!("Primary lesson '{id}' does not exist"),
        )),
        Some(_) => {}
    }

    if selections.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptySelection,
            "Select at least one subject to merge",
        ));
    }

    let mut seen: HashSet<&str> = primary_id.into_iter().collect();
    for selection in selections {
        match selection.yearly_lesson_id.as_deref() {
            None => errors.push(ValidationError::new(
                ValidationErrorKind::MissingAssignment,
                format!("Subject '{}' has no lesson assigned", selection.subject),
            )),
            Some(id) => {
                if !known.contains(id) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownEntry,
                        format!("Lesson '{}' for subject '{}' does not exist", id, selection.subject),
                    ));
                }
                if !seen.insert(id) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::DuplicateEntry,
                        format!("Lesson '{id}' is selected more than once"),
                    ));
                }
            }
        }
    }

    finish(errors)
}

/// Re-checks catalog invariants after a mutation; logs each violation.
///
/// Returns `true` when the catalog is consistent.
pub fn assert_catalog_invariants(entries: &[YearlyLesson], after: &str) -> bool {
    let mut ok = true;
    for result in [validate_catalog(entries), validate_topic_runs(entries)] {
        if let Err(errors) = result {
            ok = false;
            for e in errors {
                warn!("catalog invariant violated after {after}: {}", e.message);
            }
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, number: u32) -> YearlyLesson {
        YearlyLesson::new(id, "math", 3, number).with_class("A")
    }

    #[test]
    fn test_valid_catalog() {
        let entries = vec![entry("a", 1), entry("b", 2).with_second_half("c"), entry("c", 3)];
        assert!(validate_catalog(&entries).is_ok());
    }

    #[test]
    fn test_duplicate_lesson_number() {
        let entries = vec![entry("a", 1), entry("b", 1)];
        let errors = validate_catalog(&entries).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateLessonNumber));
    }

    #[test]
    fn test_same_number_other_class_is_fine() {
        let entries = vec![entry("a", 1), entry("b", 1).with_class("B")];
        assert!(validate_catalog(&entries).is_ok());
    }

    #[test]
    fn test_invalid_week_and_number() {
        let entries = vec![YearlyLesson::new("a", "math", 53, 0)];
        let errors = validate_catalog(&entries).unwrap_err();
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::InvalidWeek));
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidLessonNumber));
    }

    #[test]
    fn test_dangling_second_half() {
        let entries = vec![entry("a", 1).with_second_half("ghost")];
        let errors = validate_catalog(&entries).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::DanglingSecondLesson);
    }

    #[test]
    fn test_topic_run_with_hole() {
        let entries = vec![
            entry("a", 2).with_topic("T"),
            entry("b", 3),
            entry("c", 4).with_topic("T"),
        ];
        let errors = validate_topic_runs(&entries).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::NonContiguousTopic);

        let closed = vec![
            entry("a", 2).with_topic("T"),
            entry("b", 3).with_topic("T"),
            entry("c", 4).with_topic("T"),
        ];
        assert!(validate_topic_runs(&closed).is_ok());
    }

    #[test]
    fn test_slot_conflict_with_double() {
        let lessons = vec![
            WeeklyLesson::new("d", Weekday::Monday, 1, 5).as_double(None),
            WeeklyLesson::new("s", Weekday::Monday, 2, 5),
        ];
        let errors = validate_slot_occupancy(&lessons).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::SlotConflict);
    }

    #[test]
    fn test_hidden_and_other_weeks_do_not_conflict() {
        let lessons = vec![
            WeeklyLesson::new("a", Weekday::Monday, 1, 5),
            WeeklyLesson::new("b", Weekday::Monday, 1, 5).hidden(),
            WeeklyLesson::new("c", Weekday::Monday, 1, 6),
        ];
        assert!(validate_slot_occupancy(&lessons).is_ok());
    }

    #[test]
    fn test_allerlei_selection_errors() {
        let catalog = vec![entry("p", 1), entry("d", 2)];

        let errors = validate_allerlei_selection(None, &[], &catalog).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::NoPrimarySelected));
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::EmptySelection));

        let selections = vec![
            AllerleiSelection::new("Art", None),
            AllerleiSelection::new("Music", Some("d")),
            AllerleiSelection::new("Sport", Some("d")),
        ];
        let errors = validate_allerlei_selection(Some("p"), &selections, &catalog).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::MissingAssignment));
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateEntry));
    }

    #[test]
    fn test_allerlei_selection_valid() {
        let catalog = vec![entry("p", 1), entry("d", 2)];
        let selections = vec![AllerleiSelection::new("Music", Some("d"))];
        assert!(validate_allerlei_selection(Some("p"), &selections, &catalog).is_ok());
    }

    #[test]
    fn test_assert_invariants() {
        assert!(assert_catalog_invariants(&[entry("a", 1)], "test"));
        assert!(!assert_catalog_invariants(&[entry("a", 1), entry("b", 1)], "test"));
    }
}
