//! Shared state mirror fed by the change hooks.

use log::debug;
use parking_lot::Mutex;

use super::{reduce, Action, ChangeObserver, CorrelationId, PlannerState, RequestToken, RequestTracker};
use crate::models::{AllerleiGroup, WeeklyLesson, YearlyLesson};

/// Planner state behind a lock, updated through [`reduce`].
///
/// Register it as the services' [`ChangeObserver`] to keep a local view
/// in step with every store mutation.
#[derive(Debug, Default)]
pub struct StateMirror {
    state: Mutex<PlannerState>,
    requests: RequestTracker,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror seeded with an initial state.
    pub fn with_state(state: PlannerState) -> Self {
        Self {
            state: Mutex::new(state),
            requests: RequestTracker::new(),
        }
    }

    /// Applies one action.
    pub fn dispatch(&self, action: Action) {
        let mut guard = self.state.lock();
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, action);
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> PlannerState {
        self.state.lock().clone()
    }

    /// Issues a request token for a logical load or save.
    pub fn begin_request(&self, key: impl Into<String>) -> RequestToken {
        self.requests.begin(key)
    }

    /// Applies `action` only if `token` is still the latest request of its
    /// key. A superseded response is dropped and `false` is returned.
    pub fn apply_if_current(&self, token: &RequestToken, action: Action) -> bool {
        if !self.requests.finish(token) {
            debug!("dropping stale response for '{}'", token.key());
            return false;
        }
        self.dispatch(action);
        true
    }
}

impl ChangeObserver for StateMirror {
    fn entry_created(&self, entry: &YearlyLesson) {
        self.dispatch(Action::EntryUpserted(entry.clone()));
    }

    fn entry_updated(&self, entry: &YearlyLesson) {
        self.dispatch(Action::EntryUpserted(entry.clone()));
    }

    fn entry_deleted(&self, id: &str) {
        self.dispatch(Action::EntryRemoved(id.to_string()));
    }

    fn lesson_created(&self, lesson: &WeeklyLesson) {
        self.dispatch(Action::LessonUpserted(lesson.clone()));
    }

    fn lesson_updated(&self, lesson: &WeeklyLesson) {
        self.dispatch(Action::LessonUpserted(lesson.clone()));
    }

    fn lesson_deleted(&self, id: &str) {
        self.dispatch(Action::LessonRemoved(id.to_string()));
    }

    fn group_created(&self, group: &AllerleiGroup) {
        self.dispatch(Action::GroupUpserted(group.clone()));
    }

    fn group_deleted(&self, id: &str) {
        self.dispatch(Action::GroupRemoved(id.to_string()));
    }

    fn pending_begin(&self, op: CorrelationId, temp: &YearlyLesson) {
        self.dispatch(Action::PendingBegun {
            op,
            temp: temp.clone(),
        });
    }

    fn pending_confirm(&self, op: CorrelationId, entry: &YearlyLesson) {
        self.dispatch(Action::PendingConfirmed {
            op,
            entry: entry.clone(),
        });
    }

    fn pending_discard(&self, op: CorrelationId) {
        self.dispatch(Action::PendingDiscarded { op });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday;

    #[test]
    fn test_hooks_update_state() {
        let mirror = StateMirror::new();
        let lesson = WeeklyLesson::new("l1", Weekday::Monday, 1, 1);
        mirror.lesson_created(&lesson);
        mirror.entry_created(&YearlyLesson::new("e1", "math", 1, 1));
        assert_eq!(mirror.snapshot().lessons.len(), 1);
        mirror.lesson_deleted("l1");
        let state = mirror.snapshot();
        assert!(state.lessons.is_empty());
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mirror = StateMirror::new();
        let old = mirror.begin_request("week-1");
        let new = mirror.begin_request("week-1");

        let fresh = vec![WeeklyLesson::new("new", Weekday::Tuesday, 2, 1)];
        assert!(mirror.apply_if_current(
            &new,
            Action::WeekLoaded {
                week_number: 1,
                lessons: fresh
            }
        ));
        let stale = vec![WeeklyLesson::new("old", Weekday::Monday, 1, 1)];
        assert!(!mirror.apply_if_current(
            &old,
            Action::WeekLoaded {
                week_number: 1,
                lessons: stale
            }
        ));
        assert_eq!(mirror.snapshot().lessons[0].id, "new");
    }
}
