//! Merged ("Allerlei") lessons.
//!
//! # State Machine
//!
//! ```text
//!              integrate                      unlink
//! standalone ─────────────▶ merged (primary) ─────────▶ standalone, back on the grid
//!            └────────────▶ merged (donor)   ─────────▶ standalone, unscheduled
//! ```
//!
//! **Integrate** validates the selection, snapshots every member's display
//! metadata into a new group, then fans out one task per member: hide the
//! member's visible lessons of the week (except the block being edited),
//! then mark the entry as merged. Donor names get the " (Allerlei)" marker.
//!
//! **Unlink** deletes the block, restores the primary from its snapshot
//! and puts it back on the grid (un-hiding its own lesson, or allocating a
//! fresh one from the block position). Donors get their metadata back but
//! stay hidden: they return to the unscheduled pool so nothing is double
//! booked. The group record is deleted last.
//!
//! Partial failures are collected, never rolled back.

use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RetryPolicy;
use crate::error::{OperationFailure, PlanningError, PlanningResult, ResolutionIssue};
use crate::models::{
    AllerleiGroup, EntrySnapshot, SlotRef, TimetableSettings, WeeklyLesson, Weekday, YearlyLesson,
};
use crate::scheduler::{build_lesson, find_free_slot, Placement};
use crate::state::ChangeObserver;
use crate::store::{retry_on_cancel, Filter, Stores, WeeklyLessonPatch, YearlyLessonPatch};
use crate::validation::{assert_catalog_invariants, validate_allerlei_selection, ValidationErrorKind};

/// Suffix appended to donor names while merged.
pub const ALLERLEI_MARKER: &str = " (Allerlei)";

/// Subject label of a freshly created merged block.
const BLOCK_SUBJECT: &str = "Allerlei";

/// One subject picked for a merge, with the catalog entry assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllerleiSelection {
    /// Subject display name.
    pub subject: String,
    /// Assigned catalog entry; `None` until the user picks one.
    pub yearly_lesson_id: Option<String>,
}

impl AllerleiSelection {
    pub fn new(subject: impl Into<String>, yearly_lesson_id: Option<&str>) -> Self {
        Self {
            subject: subject.into(),
            yearly_lesson_id: yearly_lesson_id.map(str::to_string),
        }
    }
}

/// A merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrateRequest {
    /// The primary subject and entry.
    pub primary: Option<AllerleiSelection>,
    /// Donor subjects, in selection order.
    pub selections: Vec<AllerleiSelection>,
    /// Calendar week of the merge.
    pub week_number: u32,
    /// The weekly lesson being edited into the merged block, if any.
    pub block_lesson_id: Option<String>,
}

impl IntegrateRequest {
    /// Subject labels of the merged lesson, primary first.
    pub fn subject_labels(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(self.selections.iter())
            .map(|s| s.subject.clone())
            .collect()
    }
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrateOutcome {
    pub group: AllerleiGroup,
    /// The visible merged block.
    pub block_lesson: WeeklyLesson,
    /// Weekly lessons hidden by the merge.
    pub hidden_lessons: Vec<String>,
    /// Member entries after the merge.
    pub updated_entries: Vec<YearlyLesson>,
    pub failures: Vec<OperationFailure>,
}

/// Result of an unlink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnlinkOutcome {
    /// Weekly lessons back on the grid (the primary's).
    pub restored_lessons: Vec<WeeklyLesson>,
    /// Member entries after restoring their metadata.
    pub restored_entries: Vec<YearlyLesson>,
    pub failures: Vec<OperationFailure>,
    pub issues: Vec<ResolutionIssue>,
}

/// What one member task did during integrate.
#[derive(Default)]
struct MemberResult {
    hidden: Vec<String>,
    entry: Option<YearlyLesson>,
    failures: Vec<OperationFailure>,
}

/// Merges and unmerges lessons.
pub struct AllerleiService {
    stores: Stores,
    settings: TimetableSettings,
    retry: RetryPolicy,
    observer: Arc<dyn ChangeObserver>,
}

impl AllerleiService {
    pub fn new(
        stores: Stores,
        settings: TimetableSettings,
        retry: RetryPolicy,
        observer: Arc<dyn ChangeObserver>,
    ) -> Self {
        Self {
            stores,
            settings,
            retry,
            observer,
        }
    }

    async fn load_entries(&self, ids: &[&str]) -> PlanningResult<Vec<YearlyLesson>> {
        let found = join_all(ids.iter().map(|id| self.stores.yearly.find_by_id(id))).await;
        let mut entries = Vec::with_capacity(found.len());
        for result in found {
            if let Some(entry) = result? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Merges the selected entries into one visible block.
    ///
    /// Fails with a validation error, before any write, when no primary is
    /// selected, nothing is selected, a subject has no entry assigned, an
    /// entry is unknown or appears twice.
    pub async fn integrate(&self, request: &IntegrateRequest) -> PlanningResult<IntegrateOutcome> {
        let primary_id = request
            .primary
            .as_ref()
            .and_then(|p| p.yearly_lesson_id.as_deref());
        let mut ids: Vec<&str> = primary_id.into_iter().collect();
        ids.extend(
            request
                .selections
                .iter()
                .filter_map(|s| s.yearly_lesson_id.as_deref()),
        );
        let catalog = self.load_entries(&ids).await?;
        validate_allerlei_selection(primary_id, &request.selections, &catalog)?;
        let Some(primary_id) = primary_id else {
            return Err(PlanningError::invalid(
                ValidationErrorKind::NoPrimarySelected,
                "No primary lesson selected for the merged lesson",
            ));
        };

        let week = request.week_number;
        let week_lessons = self.stores.lessons_in_week(week).await?;
        let labels = request.subject_labels();

        let block = match request.block_lesson_id.as_deref() {
            Some(id) => match week_lessons.iter().find(|l| l.id == id) {
                Some(lesson) => lesson.clone(),
                None => {
                    return Err(PlanningError::invalid(
                        ValidationErrorKind::UnknownEntry,
                        format!("Lesson '{id}' is not part of week {week}"),
                    ))
                }
            },
            None => match week_lessons.iter().find(|l| {
                l.is_visible() && l.yearly_lesson_id.as_deref() == Some(primary_id)
            }) {
                Some(lesson) => lesson.clone(),
                None => self.create_block(primary_id, week, &week_lessons).await?,
            },
        };

        let mut group = AllerleiGroup::new(
            primary_id,
            ids.iter().skip(1).map(|id| id.to_string()).collect(),
            week,
        );
        group.snapshots = catalog
            .iter()
            .map(|e| (e.id.clone(), EntrySnapshot::capture(e)))
            .collect::<BTreeMap<_, _>>();
        group.block_lesson_id = Some(block.id.clone());
        group.block_day = Some(block.day_of_week);
        group.block_period = Some(block.period_slot);
        let group = self.stores.groups.create(group).await?;
        self.observer.group_created(&group);
        info!(
            "week {week}: merging {} entries into block {} (group {})",
            catalog.len(),
            block.id,
            group.id
        );

        let results = join_all(catalog.iter().map(|entry| {
            self.park_member(
                entry,
                entry.id == primary_id,
                &week_lessons,
                &block.id,
                &labels,
            )
        }))
        .await;

        let mut outcome = IntegrateOutcome {
            group,
            block_lesson: block.clone(),
            hidden_lessons: Vec::new(),
            updated_entries: Vec::new(),
            failures: Vec::new(),
        };
        for result in results {
            outcome.hidden_lessons.extend(result.hidden);
            outcome.updated_entries.extend(result.entry);
            outcome.failures.extend(result.failures);
        }

        let block_patch = WeeklyLessonPatch {
            is_allerlei: Some(true),
            allerlei_subjects: Some(labels),
            ..Default::default()
        };
        match self.stores.lessons.update(&block.id, &block_patch).await {
            Ok(updated) => {
                self.observer.lesson_updated(&updated);
                outcome.block_lesson = updated;
            }
            Err(error) => {
                warn!("merge: marking block {} failed: {error}", block.id);
                outcome.failures.push(OperationFailure {
                    record_id: block.id.clone(),
                    error,
                });
            }
        }

        self.check_week(week, "merge").await;
        Ok(outcome)
    }

    /// Re-validates the week's catalog after a mutation.
    async fn check_week(&self, week: u32, after: &str) {
        match self.stores.yearly.list(&Filter::eq("week_number", week)).await {
            Ok(entries) => {
                assert_catalog_invariants(&entries, after);
            }
            Err(error) => debug!("{after}: skipping invariant check for week {week}: {error}"),
        }
    }

    /// Creates a new block lesson for a primary with nothing on the grid.
    async fn create_block(
        &self,
        primary_id: &str,
        week: u32,
        week_lessons: &[WeeklyLesson],
    ) -> PlanningResult<WeeklyLesson> {
        let slot = find_free_slot(
            week_lessons,
            Weekday::Monday,
            self.settings.lessons_per_day,
            week,
            1,
        )
        .ok_or_else(|| {
            PlanningError::invalid(
                ValidationErrorKind::SlotConflict,
                format!("Week {week} has no free slot for the merged lesson"),
            )
        })?;
        let mut lesson = WeeklyLesson::new(String::new(), slot.day, slot.period, week)
            .with_yearly_lesson(primary_id)
            .with_subject(BLOCK_SUBJECT);
        if let Some((start, end)) = self.settings.lesson_times(slot.period, 1) {
            lesson.start_time = Some(start);
            lesson.end_time = Some(end);
        }
        let created = self.stores.lessons.create(lesson).await?;
        self.observer.lesson_created(&created);
        Ok(created)
    }

    /// Hides a member's lessons, then marks the entry as merged.
    async fn park_member(
        &self,
        entry: &YearlyLesson,
        is_primary: bool,
        week_lessons: &[WeeklyLesson],
        block_id: &str,
        labels: &[String],
    ) -> MemberResult {
        let mut result = MemberResult::default();
        let hide = WeeklyLessonPatch::visibility(true);
        for lesson in week_lessons.iter().filter(|l| {
            l.is_visible() && l.id != block_id && l.yearly_lesson_id.as_deref() == Some(entry.id.as_str())
        }) {
            match self.stores.lessons.update(&lesson.id, &hide).await {
                Ok(hidden) => {
                    self.observer.lesson_updated(&hidden);
                    result.hidden.push(hidden.id);
                }
                Err(error) => {
                    warn!("merge: hiding lesson {} failed: {error}", lesson.id);
                    result.failures.push(OperationFailure {
                        record_id: lesson.id.clone(),
                        error,
                    });
                }
            }
        }

        let name = if is_primary || entry.name.ends_with(ALLERLEI_MARKER) {
            entry.name.clone()
        } else {
            format!("{}{}", entry.name, ALLERLEI_MARKER)
        };
        let patch = YearlyLessonPatch {
            name: Some(name),
            is_allerlei: Some(true),
            allerlei_subjects: Some(labels.to_vec()),
            ..Default::default()
        };
        match self.stores.yearly.update(&entry.id, &patch).await {
            Ok(updated) => {
                self.observer.entry_updated(&updated);
                result.entry = Some(updated);
            }
            Err(error) => {
                warn!("merge: updating entry {} failed: {error}", entry.id);
                result.failures.push(OperationFailure {
                    record_id: entry.id.clone(),
                    error,
                });
            }
        }
        result
    }

    /// Dissolves a merge group.
    pub async fn unlink(&self, group_id: &str) -> PlanningResult<UnlinkOutcome> {
        let group = self.stores.groups.find_by_id(group_id).await?.ok_or_else(|| {
            PlanningError::invalid(
                ValidationErrorKind::GroupNotFound,
                format!("Merged lesson group '{group_id}' does not exist"),
            )
        })?;
        let week = group.week_number;
        let mut outcome = UnlinkOutcome::default();
        let mut week_lessons = self.stores.lessons_in_week(week).await?;

        let mut seed = SlotRef::new(
            group.block_day.unwrap_or(Weekday::Monday),
            group.block_period.unwrap_or(1),
        );
        let mut block_labels = Vec::new();
        if let Some(block_id) = group.block_lesson_id.as_deref() {
            if let Some(block) = week_lessons.iter().find(|l| l.id == block_id) {
                seed = SlotRef::new(block.day_of_week, block.period_slot);
                block_labels = block.allerlei_subjects.clone();
            }
            match self.stores.lessons.delete(block_id).await {
                Ok(()) => {
                    self.observer.lesson_deleted(block_id);
                    week_lessons.retain(|l| l.id != block_id);
                }
                Err(error) if error.is_cancellation() => {
                    debug!("unlink: block delete cancelled: {error}");
                    outcome.failures.push(OperationFailure {
                        record_id: block_id.to_string(),
                        error,
                    });
                }
                Err(error) => {
                    warn!("unlink: deleting block {block_id} failed: {error}");
                    outcome.failures.push(OperationFailure {
                        record_id: block_id.to_string(),
                        error,
                    });
                }
            }
        }

        self.restore_primary(&group, seed, &block_labels, &week_lessons, &mut outcome)
            .await;

        let donors = join_all(
            group
                .added_yearly_lesson_ids
                .iter()
                .map(|id| self.restore_entry(&group, id)),
        )
        .await;
        for (id, result) in group.added_yearly_lesson_ids.iter().zip(donors) {
            match result {
                Ok(entry) => outcome.restored_entries.push(entry),
                Err(error) => outcome.failures.push(OperationFailure {
                    record_id: id.clone(),
                    error,
                }),
            }
        }

        match self.stores.groups.delete(&group.id).await {
            Ok(()) => self.observer.group_deleted(&group.id),
            Err(error) => {
                warn!("unlink: deleting group {} failed: {error}", group.id);
                outcome.failures.push(OperationFailure {
                    record_id: group.id.clone(),
                    error,
                });
            }
        }

        info!(
            "week {week}: unlinked group {} ({} lessons restored, {} failures)",
            group.id,
            outcome.restored_lessons.len(),
            outcome.failures.len()
        );
        self.check_week(week, "unmerge").await;
        Ok(outcome)
    }

    /// Restores one member's metadata from its snapshot.
    async fn restore_entry(
        &self,
        group: &AllerleiGroup,
        id: &str,
    ) -> crate::store::StoreResult<YearlyLesson> {
        let patch = match group.snapshot(id) {
            Some(snapshot) => YearlyLessonPatch::restore(snapshot),
            None => {
                warn!("unlink: no snapshot for entry {id}, clearing merge flags only");
                YearlyLessonPatch {
                    is_allerlei: Some(false),
                    allerlei_subjects: Some(Vec::new()),
                    ..Default::default()
                }
            }
        };
        let entry = self.stores.yearly.update(id, &patch).await?;
        self.observer.entry_updated(&entry);
        Ok(entry)
    }

    async fn restore_primary(
        &self,
        group: &AllerleiGroup,
        seed: SlotRef,
        block_labels: &[String],
        week_lessons: &[WeeklyLesson],
        outcome: &mut UnlinkOutcome,
    ) {
        let primary_id = group.primary_yearly_lesson_id.as_str();
        let entry = match self.restore_entry(group, primary_id).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!("unlink: restoring primary {primary_id} failed: {error}");
                outcome.failures.push(OperationFailure {
                    record_id: primary_id.to_string(),
                    error,
                });
                return;
            }
        };
        outcome.restored_entries.push(entry.clone());

        let hidden = week_lessons
            .iter()
            .find(|l| l.is_hidden && l.yearly_lesson_id.as_deref() == Some(primary_id));
        if let Some(lesson) = hidden {
            let show = WeeklyLessonPatch::visibility(false);
            let label = format!("unhide lesson {}", lesson.id);
            match retry_on_cancel(&self.retry, &label, || {
                self.stores.lessons.update(&lesson.id, &show)
            })
            .await
            {
                Ok(shown) => {
                    self.observer.lesson_updated(&shown);
                    outcome.restored_lessons.push(shown);
                }
                Err(error) => outcome.failures.push(OperationFailure {
                    record_id: lesson.id.clone(),
                    error,
                }),
            }
            return;
        }

        let Some(slot) = find_free_slot(
            week_lessons,
            seed.day,
            self.settings.lessons_per_day,
            group.week_number,
            seed.period,
        ) else {
            warn!(
                "unlink: week {} is fully booked, primary {primary_id} left unscheduled",
                group.week_number
            );
            outcome.issues.push(
                ResolutionIssue::new("week is fully booked, primary left unscheduled")
                    .for_entry(primary_id)
                    .in_week(group.week_number),
            );
            return;
        };

        let subject = block_labels
            .first()
            .cloned()
            .unwrap_or_else(|| entry.subject.clone());
        let placement = Placement {
            slot,
            span: 1,
            subject,
            overflowed: false,
        };
        let lesson = build_lesson(&entry, &placement, slot, None, &self.settings);
        match self.stores.lessons.create(lesson).await {
            Ok(created) => {
                self.observer.lesson_created(&created);
                outcome.restored_lessons.push(created);
            }
            Err(error) => outcome.failures.push(OperationFailure {
                record_id: primary_id.to_string(),
                error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeachingStep;
    use crate::store::MemoryStores;
    use crate::state::NoopObserver;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    fn service(mem: &MemoryStores) -> AllerleiService {
        AllerleiService::new(
            mem.stores(),
            TimetableSettings::default(),
            fast_retry(),
            Arc::new(NoopObserver),
        )
    }

    fn fixture() -> MemoryStores {
        let entries = vec![
            YearlyLesson::new("p", "math", 9, 1)
                .with_class("A")
                .with_notes("x")
                .with_step(TeachingStep::new("s1", "warm-up")),
            YearlyLesson::new("d", "art", 9, 1).with_class("A").with_notes("brushes"),
        ];
        let lessons = vec![
            WeeklyLesson::new("lp", Weekday::Monday, 1, 9)
                .with_yearly_lesson("p")
                .with_subject("Math"),
            WeeklyLesson::new("ld", Weekday::Tuesday, 3, 9)
                .with_yearly_lesson("d")
                .with_subject("Art"),
            WeeklyLesson::new("blk", Weekday::Thursday, 2, 9),
        ];
        MemoryStores::seeded(entries, lessons)
    }

    fn request(block: Option<&str>) -> IntegrateRequest {
        IntegrateRequest {
            primary: Some(AllerleiSelection::new("Math", Some("p"))),
            selections: vec![AllerleiSelection::new("Art", Some("d"))],
            week_number: 9,
            block_lesson_id: block.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_validation_blocks_mutation() {
        let mem = fixture();
        let svc = service(&mem);
        let bad = IntegrateRequest {
            primary: None,
            selections: vec![AllerleiSelection::new("Art", None)],
            week_number: 9,
            block_lesson_id: None,
        };
        let err = svc.integrate(&bad).await.unwrap_err();
        let kinds: Vec<_> = err.validation_errors().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ValidationErrorKind::NoPrimarySelected));
        assert!(kinds.contains(&ValidationErrorKind::MissingAssignment));
        assert!(mem.groups.is_empty());
        assert_eq!(mem.lessons.calls().update.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_integrate_hides_members() {
        let mem = fixture();
        let svc = service(&mem);
        let outcome = svc.integrate(&request(Some("blk"))).await.unwrap();

        assert!(outcome.failures.is_empty());
        let mut hidden = outcome.hidden_lessons.clone();
        hidden.sort();
        assert_eq!(hidden, vec!["ld", "lp"]);
        assert!(outcome.block_lesson.is_allerlei);
        assert_eq!(outcome.block_lesson.allerlei_subjects, vec!["Math", "Art"]);

        let entries = mem.yearly.snapshot();
        let donor = entries.iter().find(|e| e.id == "d").unwrap();
        let primary = entries.iter().find(|e| e.id == "p").unwrap();
        assert_eq!(donor.name, "Lektion 1 (Allerlei)");
        assert_eq!(primary.name, "Lektion 1");
        assert!(donor.is_allerlei && primary.is_allerlei);

        let group = &mem.groups.snapshot()[0];
        assert_eq!(group.snapshots.len(), 2);
        assert_eq!(group.block_day, Some(Weekday::Thursday));
    }

    #[tokio::test]
    async fn test_round_trip_restores_metadata() {
        let mem = fixture();
        let before = mem.yearly.snapshot();
        let svc = service(&mem);
        let merged = svc.integrate(&request(Some("blk"))).await.unwrap();
        let outcome = svc.unlink(&merged.group.id).await.unwrap();

        let after = mem.yearly.snapshot();
        for original in &before {
            let restored = after.iter().find(|e| e.id == original.id).unwrap();
            assert_eq!(restored.name, original.name);
            assert_eq!(restored.notes, original.notes);
            assert_eq!(restored.steps, original.steps);
            assert!(!restored.is_allerlei);
        }

        // primary back on its own slot, donor stays hidden, block gone
        assert_eq!(outcome.restored_lessons.len(), 1);
        assert_eq!(outcome.restored_lessons[0].id, "lp");
        let lessons = mem.lessons.snapshot();
        assert!(lessons.iter().all(|l| l.id != "blk"));
        assert!(lessons.iter().find(|l| l.id == "ld").unwrap().is_hidden);
        assert!(!lessons.iter().find(|l| l.id == "lp").unwrap().is_hidden);
        assert!(mem.groups.is_empty());
    }

    #[tokio::test]
    async fn test_unhide_retries_cancellation() {
        let mem = fixture();
        let svc = service(&mem);
        let merged = svc.integrate(&request(Some("blk"))).await.unwrap();
        mem.lessons.cancel_next_updates("lp", 2);

        let outcome = svc.unlink(&merged.group.id).await.unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.restored_lessons[0].id, "lp");
    }

    #[tokio::test]
    async fn test_primary_block_is_reallocated() {
        let mem = fixture();
        let svc = service(&mem);
        let merged = svc.integrate(&request(None)).await.unwrap();
        assert_eq!(merged.block_lesson.id, "lp");
        assert_eq!(merged.hidden_lessons, vec!["ld"]);

        let outcome = svc.unlink(&merged.group.id).await.unwrap();
        let restored = &outcome.restored_lessons[0];
        assert_ne!(restored.id, "lp");
        assert_eq!((restored.day_of_week, restored.period_slot), (Weekday::Monday, 1));
        assert_eq!(restored.yearly_lesson_id.as_deref(), Some("p"));
        assert_eq!(restored.subject, "Math");
        assert!(!restored.is_allerlei);
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let mem = fixture();
        let err = service(&mem).unlink("nope").await.unwrap_err();
        assert_eq!(err.validation_errors()[0].kind, ValidationErrorKind::GroupNotFound);
    }
}
