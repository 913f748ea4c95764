//! Catalog edits that ripple into the weekly grid.

use futures::future::join_all;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::gaps::{GapFillReport, GapFiller};
use crate::error::{OperationFailure, PlanningError, PlanningResult, ResolutionIssue};
use crate::models::{SlotRef, TimetableSettings, WeeklyLesson, YearlyLesson};
use crate::scheduler::OccupancyGrid;
use crate::state::ChangeObserver;
use crate::store::{Filter, Stores, WeeklyLessonPatch, YearlyLessonPatch};
use crate::validation::{assert_catalog_invariants, ValidationError, ValidationErrorKind};

/// Result of a topic assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicAssignment {
    /// Entries carrying the new topic.
    pub updated: Vec<YearlyLesson>,
    /// Gap fill triggered by the assignment.
    pub gap_fill: GapFillReport,
    pub failures: Vec<OperationFailure>,
}

/// Result of toggling a double lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleToggle {
    pub entry: YearlyLesson,
    /// The entry's weekly lesson after the toggle, if it has one.
    pub lesson: Option<WeeklyLesson>,
    /// The second half's lesson: hidden on pairing, shown again on unpairing.
    pub partner: Option<WeeklyLesson>,
    pub issues: Vec<ResolutionIssue>,
}

/// Result of removing an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalReport {
    /// Weekly lessons deleted with the entry.
    pub deleted_lessons: Vec<String>,
    /// Records that referenced the entry as a second half and were unpaired.
    pub detached: Vec<String>,
    pub failures: Vec<OperationFailure>,
    /// Whether the week's catalog passed the invariant check afterwards.
    pub catalog_consistent: bool,
}

/// Topic, double-lesson and deletion events.
pub struct PlanningEvents {
    stores: Stores,
    settings: TimetableSettings,
    observer: Arc<dyn ChangeObserver>,
    gaps: GapFiller,
}

impl PlanningEvents {
    pub fn new(stores: Stores, settings: TimetableSettings, observer: Arc<dyn ChangeObserver>) -> Self {
        let gaps = GapFiller::new(stores.clone(), observer.clone());
        Self {
            stores,
            settings,
            observer,
            gaps,
        }
    }

    async fn require_entry(&self, id: &str) -> PlanningResult<YearlyLesson> {
        self.stores.yearly.find_by_id(id).await?.ok_or_else(|| {
            PlanningError::invalid(
                ValidationErrorKind::UnknownEntry,
                format!("Lesson '{id}' does not exist"),
            )
        })
    }

    /// Sets (or clears) the topic of several entries, then closes any gap
    /// the new topic leaves in its run.
    pub async fn assign_topic(
        &self,
        entry_ids: &[&str],
        topic_id: Option<&str>,
    ) -> PlanningResult<TopicAssignment> {
        if topic_id.is_some_and(str::is_empty) {
            return Err(PlanningError::invalid(
                ValidationErrorKind::TopicRequired,
                "A topic is required",
            ));
        }
        if entry_ids.is_empty() {
            return Err(PlanningError::invalid(
                ValidationErrorKind::EmptySelection,
                "Select at least one lesson",
            ));
        }

        let found = join_all(entry_ids.iter().map(|id| self.stores.yearly.find_by_id(id))).await;
        let mut errors = Vec::new();
        for (id, result) in entry_ids.iter().zip(found) {
            if result?.is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownEntry,
                    format!("Lesson '{id}' does not exist"),
                ));
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let topic = topic_id.map(str::to_string);
        let patch = YearlyLessonPatch {
            topic_id: Some(topic.clone()),
            ..Default::default()
        };
        let lesson_patch = WeeklyLessonPatch {
            topic_id: Some(topic.clone()),
            ..Default::default()
        };

        let mut report = TopicAssignment::default();
        let results = join_all(entry_ids.iter().map(|id| self.stores.yearly.update(id, &patch))).await;
        for (id, result) in entry_ids.iter().zip(results) {
            match result {
                Ok(entry) => {
                    self.observer.entry_updated(&entry);
                    report.updated.push(entry);
                }
                Err(error) => report.failures.push(OperationFailure {
                    record_id: id.to_string(),
                    error,
                }),
            }
        }

        for entry in &report.updated {
            let lessons = match self
                .stores
                .lessons
                .list(&Filter::eq("yearly_lesson_id", &entry.id))
                .await
            {
                Ok(lessons) => lessons,
                Err(error) => {
                    warn!("topic: loading lessons of {} failed: {error}", entry.id);
                    report.failures.push(OperationFailure {
                        record_id: entry.id.clone(),
                        error,
                    });
                    continue;
                }
            };
            for lesson in lessons {
                match self.stores.lessons.update(&lesson.id, &lesson_patch).await {
                    Ok(updated) => self.observer.lesson_updated(&updated),
                    Err(error) => report.failures.push(OperationFailure {
                        record_id: lesson.id,
                        error,
                    }),
                }
            }
        }

        let Some(topic_id) = topic_id else {
            return Ok(report);
        };
        let runs: BTreeSet<(u32, String)> = report
            .updated
            .iter()
            .map(|e| (e.week_number, e.subject.clone()))
            .collect();
        for (week, subject) in runs {
            let filter = Filter::eq("week_number", week).and(Filter::eq("subject", &subject));
            let entries = self.stores.yearly.list(&filter).await?;
            if entries.iter().filter(|e| e.has_topic(topic_id)).count() < 2 {
                continue;
            }
            let filled = self.gaps.fill_gaps(&entries, week, &subject, topic_id).await;
            debug!(
                "topic '{topic_id}' week {week} '{subject}': {} placeholders, {} re-topiced",
                filled.created.len(),
                filled.retopiced.len()
            );
            report.gap_fill.created.extend(filled.created);
            report.gap_fill.retopiced.extend(filled.retopiced);
            report.gap_fill.failures.extend(filled.failures);
        }
        Ok(report)
    }

    /// Pairs an entry with its successor as a double lesson, or unpairs it.
    ///
    /// The entry's visible weekly lesson follows: it spans two periods when
    /// the next period is free, and falls back to one period on unpairing.
    /// The successor's own lesson is hidden while absorbed into the double
    /// and shown again (or re-seated by the allocator) once unpaired.
    pub async fn toggle_double_lesson(&self, entry_id: &str) -> PlanningResult<DoubleToggle> {
        let entry = self.require_entry(entry_id).await?;
        let pairing = !entry.is_double_lesson;
        let former_second = entry.second_yearly_lesson_id.clone();

        let second_id = if pairing {
            let filter = Filter::eq("subject", &entry.subject)
                .and(Filter::eq("week_number", entry.week_number))
                .and(Filter::eq("class_id", &entry.class_id))
                .and(Filter::eq("lesson_number", entry.lesson_number + 1));
            let successor = self.stores.yearly.list(&filter).await?.into_iter().next();
            match successor {
                Some(s) => Some(s.id),
                None => {
                    return Err(PlanningError::invalid(
                        ValidationErrorKind::InvalidLessonNumber,
                        format!(
                            "Lesson {} has no following lesson to pair with",
                            entry.lesson_number
                        ),
                    ))
                }
            }
        } else {
            None
        };

        let patch = YearlyLessonPatch {
            is_double_lesson: Some(pairing),
            second_yearly_lesson_id: Some(second_id.clone()),
            ..Default::default()
        };
        let entry = self.stores.yearly.update(entry_id, &patch).await?;
        self.observer.entry_updated(&entry);

        let mut toggle = DoubleToggle {
            entry,
            lesson: None,
            partner: None,
            issues: Vec::new(),
        };

        let week_lessons = self.stores.lessons_in_week(toggle.entry.week_number).await?;
        let Some(lesson) = week_lessons
            .iter()
            .find(|l| l.is_visible() && l.yearly_lesson_id.as_deref() == Some(entry_id))
        else {
            return Ok(toggle);
        };

        let span = match second_id.as_deref() {
            Some(second) => {
                let others: Vec<WeeklyLesson> = week_lessons
                    .iter()
                    .filter(|l| l.id != lesson.id && l.yearly_lesson_id.as_deref() != Some(second))
                    .cloned()
                    .collect();
                let grid = OccupancyGrid::for_week(&others, lesson.week_number);
                let fits = lesson.period_slot < self.settings.lessons_per_day
                    && grid.is_available(lesson.day_of_week, lesson.period_slot, 2);
                if fits {
                    2
                } else {
                    warn!(
                        "double lesson {entry_id}: {} period {} is taken, lesson stays single",
                        lesson.day_of_week,
                        lesson.period_slot + 1
                    );
                    toggle.issues.push(
                        ResolutionIssue::new("next period is taken, weekly lesson stays single")
                            .for_entry(entry_id)
                            .in_week(lesson.week_number),
                    );
                    1
                }
            }
            None => 1,
        };

        let (start, end) = self.settings.lesson_times(lesson.period_slot, span).unzip();
        let lesson_patch = WeeklyLessonPatch {
            is_double_lesson: Some(span == 2),
            period_span: Some(span),
            second_yearly_lesson_id: Some(if span == 2 { second_id.clone() } else { None }),
            start_time: Some(start),
            end_time: Some(end),
            ..Default::default()
        };
        let updated = self.stores.lessons.update(&lesson.id, &lesson_patch).await?;
        self.observer.lesson_updated(&updated);

        if span == 2 {
            if let Some(second) = second_id.as_deref() {
                toggle.partner = self.hide_partner(&week_lessons, second).await?;
            }
        } else if !pairing {
            if let Some(former) = former_second.as_deref() {
                toggle.partner = self
                    .restore_partner(&updated, former, &mut toggle.issues)
                    .await?;
            }
        }
        toggle.lesson = Some(updated);
        Ok(toggle)
    }

    /// Hides the visible lessons of an entry absorbed into a double lesson.
    async fn hide_partner(
        &self,
        week_lessons: &[WeeklyLesson],
        second_id: &str,
    ) -> PlanningResult<Option<WeeklyLesson>> {
        let mut hidden = None;
        for partner in week_lessons
            .iter()
            .filter(|l| l.is_visible() && l.yearly_lesson_id.as_deref() == Some(second_id))
        {
            let updated = self
                .stores
                .lessons
                .update(&partner.id, &WeeklyLessonPatch::visibility(true))
                .await?;
            self.observer.lesson_updated(&updated);
            debug!("double lesson: hid lesson {} of second half {second_id}", updated.id);
            hidden = Some(updated);
        }
        Ok(hidden)
    }

    /// Gives a former second half a visible lesson again.
    ///
    /// A hidden lesson is shown at its old slot when free, else moved to the
    /// next free slot. Without any lesson, one is created right after the
    /// former double.
    async fn restore_partner(
        &self,
        primary: &WeeklyLesson,
        former_id: &str,
        issues: &mut Vec<ResolutionIssue>,
    ) -> PlanningResult<Option<WeeklyLesson>> {
        let week = primary.week_number;
        let week_lessons = self.stores.lessons_in_week(week).await?;
        let owned: Vec<&WeeklyLesson> = week_lessons
            .iter()
            .filter(|l| l.yearly_lesson_id.as_deref() == Some(former_id))
            .collect();
        if owned.iter().any(|l| l.is_visible()) {
            return Ok(None);
        }

        let slot_count = self.settings.lessons_per_day;
        let (day, period) = match owned.first() {
            Some(hidden) => (hidden.day_of_week, hidden.period_slot),
            None => (primary.day_of_week, primary.period_slot + 1),
        };
        let grid = OccupancyGrid::for_week(&week_lessons, week);
        let slot = if period <= slot_count && grid.is_free(day, period) {
            SlotRef::new(day, period)
        } else {
            match grid.find_free(day, slot_count, period, 1) {
                Some(free) => free,
                None => {
                    warn!("week {week}: no free slot left for former second half {former_id}");
                    issues.push(
                        ResolutionIssue::new("week is fully booked, former second half stays unplaced")
                            .for_entry(former_id)
                            .in_week(week),
                    );
                    return Ok(None);
                }
            }
        };
        let (start, end) = self.settings.lesson_times(slot.period, 1).unzip();

        if let Some(hidden) = owned.first() {
            let patch = WeeklyLessonPatch {
                day_of_week: Some(slot.day),
                period_slot: Some(slot.period),
                is_hidden: Some(false),
                start_time: Some(start),
                end_time: Some(end),
                ..Default::default()
            };
            let shown = self.stores.lessons.update(&hidden.id, &patch).await?;
            self.observer.lesson_updated(&shown);
            return Ok(Some(shown));
        }

        let Some(former) = self.stores.yearly.find_by_id(former_id).await? else {
            return Ok(None);
        };
        let mut lesson = WeeklyLesson::new(String::new(), slot.day, slot.period, week)
            .with_yearly_lesson(&former.id)
            .with_subject(&primary.subject);
        lesson.topic_id = former.topic_id.clone();
        lesson.start_time = start;
        lesson.end_time = end;
        let created = self.stores.lessons.create(lesson).await?;
        self.observer.lesson_created(&created);
        Ok(Some(created))
    }

    /// Deletes an entry together with every weekly lesson backed by it.
    ///
    /// Double lessons using the entry as their second half are unpaired.
    pub async fn remove_entry(&self, entry_id: &str) -> PlanningResult<RemovalReport> {
        let week = self.require_entry(entry_id).await?.week_number;
        let mut report = RemovalReport::default();

        let owned = self
            .stores
            .lessons
            .list(&Filter::eq("yearly_lesson_id", entry_id))
            .await?;
        for lesson in owned {
            match self.stores.lessons.delete(&lesson.id).await {
                Ok(()) => {
                    self.observer.lesson_deleted(&lesson.id);
                    report.deleted_lessons.push(lesson.id);
                }
                Err(error) => report.failures.push(OperationFailure {
                    record_id: lesson.id,
                    error,
                }),
            }
        }

        let paired_lessons = self
            .stores
            .lessons
            .list(&Filter::eq("second_yearly_lesson_id", entry_id))
            .await?;
        let unpair_lesson = WeeklyLessonPatch {
            is_double_lesson: Some(false),
            period_span: Some(1),
            second_yearly_lesson_id: Some(None),
            ..Default::default()
        };
        for lesson in paired_lessons {
            match self.stores.lessons.update(&lesson.id, &unpair_lesson).await {
                Ok(updated) => {
                    self.observer.lesson_updated(&updated);
                    report.detached.push(updated.id);
                }
                Err(error) => report.failures.push(OperationFailure {
                    record_id: lesson.id,
                    error,
                }),
            }
        }

        let paired_entries = self
            .stores
            .yearly
            .list(&Filter::eq("second_yearly_lesson_id", entry_id))
            .await?;
        let unpair_entry = YearlyLessonPatch {
            is_double_lesson: Some(false),
            second_yearly_lesson_id: Some(None),
            ..Default::default()
        };
        for entry in paired_entries {
            match self.stores.yearly.update(&entry.id, &unpair_entry).await {
                Ok(updated) => {
                    self.observer.entry_updated(&updated);
                    report.detached.push(updated.id);
                }
                Err(error) => report.failures.push(OperationFailure {
                    record_id: entry.id,
                    error,
                }),
            }
        }

        self.stores.yearly.delete(entry_id).await?;
        self.observer.entry_deleted(entry_id);

        match self.stores.yearly.list(&Filter::eq("week_number", week)).await {
            Ok(entries) => {
                report.catalog_consistent = assert_catalog_invariants(&entries, "remove entry");
            }
            Err(error) => debug!("remove entry: skipping invariant check for week {week}: {error}"),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday;
    use crate::planning::find_gaps;
    use crate::state::NoopObserver;
    use crate::store::MemoryStores;
    use crate::validation::validate_slot_occupancy;

    fn entry(id: &str, n: u32) -> YearlyLesson {
        YearlyLesson::new(id, "math", 5, n).with_class("A")
    }

    fn events(mem: &MemoryStores) -> PlanningEvents {
        PlanningEvents::new(mem.stores(), TimetableSettings::default(), Arc::new(NoopObserver))
    }

    #[tokio::test]
    async fn test_assign_topic_fills_gap() {
        let entries = vec![entry("a", 2), entry("c", 4)];
        let lessons = vec![WeeklyLesson::new("la", Weekday::Monday, 1, 5).with_yearly_lesson("a")];
        let mem = MemoryStores::seeded(entries, lessons);

        let report = events(&mem).assign_topic(&["a", "c"], Some("T")).await.unwrap();
        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.gap_fill.created.len(), 1);
        assert_eq!(report.gap_fill.created[0].lesson_number, 3);
        assert!(find_gaps(&mem.yearly.snapshot(), 5, "math", "T").is_empty());
        assert_eq!(mem.lessons.snapshot()[0].topic_id.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_assign_single_topic_no_fill() {
        let mem = MemoryStores::seeded(vec![entry("a", 2)], Vec::new());
        let report = events(&mem).assign_topic(&["a"], Some("T")).await.unwrap();
        assert!(report.gap_fill.is_empty());
        assert_eq!(mem.yearly.len(), 1);
    }

    #[tokio::test]
    async fn test_assign_topic_validation() {
        let mem = MemoryStores::seeded(vec![entry("a", 1)], Vec::new());
        let ev = events(&mem);
        let err = ev.assign_topic(&["a"], Some("")).await.unwrap_err();
        assert_eq!(err.validation_errors()[0].kind, ValidationErrorKind::TopicRequired);
        let err = ev.assign_topic(&["a", "zz"], Some("T")).await.unwrap_err();
        assert_eq!(err.validation_errors()[0].kind, ValidationErrorKind::UnknownEntry);
        assert_eq!(mem.yearly.snapshot()[0].topic_id, None);
    }

    #[tokio::test]
    async fn test_toggle_double_lesson() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let lessons = vec![WeeklyLesson::new("la", Weekday::Monday, 1, 5).with_yearly_lesson("a")];
        let mem = MemoryStores::seeded(entries, lessons);
        let ev = events(&mem);

        let on = ev.toggle_double_lesson("a").await.unwrap();
        assert!(on.entry.is_double_lesson);
        assert_eq!(on.entry.second_yearly_lesson_id.as_deref(), Some("b"));
        let lesson = on.lesson.unwrap();
        assert_eq!(lesson.period_span, 2);
        assert_eq!(lesson.second_yearly_lesson_id.as_deref(), Some("b"));

        let off = ev.toggle_double_lesson("a").await.unwrap();
        assert!(!off.entry.is_double_lesson);
        assert_eq!(off.lesson.unwrap().period_span, 1);
        let seated = off.partner.unwrap();
        assert_eq!(seated.yearly_lesson_id.as_deref(), Some("b"));
        assert_eq!((seated.day_of_week, seated.period_slot), (Weekday::Monday, 2));
        assert!(validate_slot_occupancy(&mem.lessons.snapshot()).is_ok());
    }

    #[tokio::test]
    async fn test_toggle_absorbs_adjacent_successor_lesson() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let lessons = vec![
            WeeklyLesson::new("la", Weekday::Monday, 1, 5).with_yearly_lesson("a"),
            WeeklyLesson::new("lb", Weekday::Monday, 2, 5).with_yearly_lesson("b"),
        ];
        let mem = MemoryStores::seeded(entries, lessons);
        let ev = events(&mem);

        let on = ev.toggle_double_lesson("a").await.unwrap();
        assert!(on.issues.is_empty());
        assert_eq!(on.lesson.unwrap().period_span, 2);
        assert_eq!(on.partner.map(|l| l.id).as_deref(), Some("lb"));
        let lb = mem.lessons.snapshot().into_iter().find(|l| l.id == "lb").unwrap();
        assert!(lb.is_hidden);
        assert!(validate_slot_occupancy(&mem.lessons.snapshot()).is_ok());

        let off = ev.toggle_double_lesson("a").await.unwrap();
        assert_eq!(off.lesson.unwrap().period_span, 1);
        let lb = off.partner.unwrap();
        assert_eq!(lb.id, "lb");
        assert!(lb.is_visible());
        assert_eq!((lb.day_of_week, lb.period_slot), (Weekday::Monday, 2));
        assert_eq!(mem.lessons.len(), 2);
        assert!(validate_slot_occupancy(&mem.lessons.snapshot()).is_ok());
    }

    #[tokio::test]
    async fn test_toggle_blocked_next_period() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let lessons = vec![
            WeeklyLesson::new("la", Weekday::Monday, 1, 5).with_yearly_lesson("a"),
            WeeklyLesson::new("x", Weekday::Monday, 2, 5),
        ];
        let mem = MemoryStores::seeded(entries, lessons);
        let toggle = events(&mem).toggle_double_lesson("a").await.unwrap();
        assert!(toggle.entry.is_double_lesson);
        assert_eq!(toggle.lesson.unwrap().period_span, 1);
        assert_eq!(toggle.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_last_lesson_rejected() {
        let mem = MemoryStores::seeded(vec![entry("a", 1)], Vec::new());
        let err = events(&mem).toggle_double_lesson("a").await.unwrap_err();
        assert_eq!(err.validation_errors()[0].kind, ValidationErrorKind::InvalidLessonNumber);
    }

    #[tokio::test]
    async fn test_remove_entry_cascades() {
        let entries = vec![entry("a", 1).with_second_half("b"), entry("b", 2)];
        let lessons = vec![
            WeeklyLesson::new("la", Weekday::Monday, 1, 5)
                .with_yearly_lesson("a")
                .as_double(Some("b".into())),
            WeeklyLesson::new("lb", Weekday::Friday, 1, 5).with_yearly_lesson("b"),
        ];
        let mem = MemoryStores::seeded(entries, lessons);

        let report = events(&mem).remove_entry("b").await.unwrap();
        assert_eq!(report.deleted_lessons, vec!["lb"]);
        assert_eq!(report.detached.len(), 2);
        assert_eq!(mem.yearly.len(), 1);
        assert!(!mem.yearly.snapshot()[0].is_double_lesson);
        let remaining = mem.lessons.snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].period_span, 1);
        assert!(report.catalog_consistent);
    }

    #[tokio::test]
    async fn test_remove_entry_reports_dangling_pair() {
        let entries = vec![
            entry("a", 1).with_second_half("b"),
            entry("b", 2),
            entry("c", 3),
        ];
        let mem = MemoryStores::seeded(entries, Vec::new());
        mem.yearly.cancel_next_updates("a", 1);

        let report = events(&mem).remove_entry("b").await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(mem.yearly.len(), 2);
        assert!(!report.catalog_consistent);
    }
}
