//! Subject model.

use serde::{Deserialize, Serialize};

/// A taught subject.
///
/// Catalog entries reference subjects by `id`; timetable templates
/// reference them by display `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier.
    pub id: String,
    /// Display name, as used in timetable templates.
    pub name: String,
    /// Class the subject is taught in.
    pub class_id: String,
}

impl Subject {
    /// Creates a new subject.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class_id: class_id.into(),
        }
    }
}

/// Resolves a subject id to its display name.
///
/// Falls back to matching by name, since older catalog rows store the
/// display name directly in the subject field.
pub fn resolve_subject_name<'a>(subjects: &'a [Subject], subject_ref: &str) -> Option<&'a str> {
    subjects
        .iter()
        .find(|s| s.id == subject_ref)
        .or_else(|| subjects.iter().find(|s| s.name == subject_ref))
        .map(|s| s.name.as_str())
}
