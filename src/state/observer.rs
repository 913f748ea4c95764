//! Change hooks for collaborators that mirror store state.

use super::CorrelationId;
use crate::models::{AllerleiGroup, WeeklyLesson, YearlyLesson};

/// Notified after each successful store mutation.
///
/// Every hook has a no-op default, so implementors override only what
/// they mirror.
pub trait ChangeObserver: Send + Sync {
    fn entry_created(&self, _entry: &YearlyLesson) {}
    fn entry_updated(&self, _entry: &YearlyLesson) {}
    fn entry_deleted(&self, _id: &str) {}

    fn lesson_created(&self, _lesson: &WeeklyLesson) {}
    fn lesson_updated(&self, _lesson: &WeeklyLesson) {}
    fn lesson_deleted(&self, _id: &str) {}

    fn group_created(&self, _group: &AllerleiGroup) {}
    fn group_deleted(&self, _id: &str) {}

    /// An optimistic create was issued; `temp` is shown until it settles.
    fn pending_begin(&self, _op: CorrelationId, _temp: &YearlyLesson) {}
    /// The store accepted an optimistic create.
    fn pending_confirm(&self, _op: CorrelationId, _entry: &YearlyLesson) {}
    /// The store rejected an optimistic create.
    fn pending_discard(&self, _op: CorrelationId) {}
}

/// Observer that ignores every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ChangeObserver for NoopObserver {}
