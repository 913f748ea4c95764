//! Crate-level error type.
//!
//! Only two things abort an operation: user-correctable validation
//! failures (raised before any mutation) and store failures on reads the
//! operation cannot proceed without. Everything else degrades and is
//! reported in the operation's result.

use crate::store::StoreError;
use crate::validation::{ValidationError, ValidationErrorKind};

/// Result type for scheduling operations.
pub type PlanningResult<T> = Result<T, PlanningError>;

/// Error type for scheduling operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanningError {
    /// The request is invalid; nothing was changed.
    #[error("validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    /// The store failed on a required read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PlanningError {
    /// A single validation error.
    pub fn invalid(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(kind, message)])
    }

    /// Validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Validation(errors) => errors,
            Self::Store(_) => &[],
        }
    }

    /// Whether the failure is the swallowed "operation was cancelled" outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_cancellation())
    }
}

impl From<Vec<ValidationError>> for PlanningError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

/// A non-fatal resolution failure, logged and reported in results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionIssue {
    /// Catalog entry concerned, if any.
    pub yearly_lesson_id: Option<String>,
    /// Calendar week concerned, if any.
    pub week_number: Option<u32>,
    /// What went wrong and how it was handled.
    pub message: String,
}

impl ResolutionIssue {
    /// Creates an issue.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            yearly_lesson_id: None,
            week_number: None,
            message: message.into(),
        }
    }

    /// Attaches the catalog entry.
    pub fn for_entry(mut self, yearly_lesson_id: impl Into<String>) -> Self {
        self.yearly_lesson_id = Some(yearly_lesson_id.into());
        self
    }

    /// Attaches the week.
    pub fn in_week(mut self, week_number: u32) -> Self {
        self.week_number = Some(week_number);
        self
    }
}

/// A store write that failed within an otherwise completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Record the write targeted.
    pub record_id: String,
    /// The store error.
    pub error: StoreError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ErrorContext;

    #[test]
    fn test_validation_message_joins() {
        let err = PlanningError::Validation(vec![
            ValidationError::new(ValidationErrorKind::EmptySelection, "pick one"),
            ValidationError::new(ValidationErrorKind::NoPrimarySelected, "no primary"),
        ]);
        assert_eq!(err.to_string(), "validation failed: pick one; no primary");
        assert_eq!(err.validation_errors().len(), 2);
    }

    #[test]
    fn test_store_error_passthrough() {
        let err: PlanningError =
            StoreError::cancelled("superseded", ErrorContext::new("update")).into();
        assert!(err.is_cancellation());
        assert!(err.validation_errors().is_empty());
    }
}
