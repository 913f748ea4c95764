//! Yearly → weekly lesson synchronization.
//!
//! Maps one catalog entry to a concrete weekday and period using the
//! recurring template, then upserts its weekly lesson.
//!
//! # Placement Rule
//!
//! 1. Resolve the entry's subject display name.
//! 2. Build the slot sequence of (subject, class): every template slot of
//!    the pair, sorted by (weekday, period).
//! 3. Place lesson number `n` on `sequence[n - 1]`.
//! 4. If `n` exceeds the sequence, fall back to the last slot and report
//!    the overflow.
//! 5. An entry is absorbed into the double lesson of the entry directly
//!    before it in lesson order when that entry declares it as second half
//!    and its own slot starts a structural double. Walking the group this
//!    way matches the generator's cursor.
//!
//! Placement is a pure function of declared order, so re-running the
//! synchronizer on unchanged input is idempotent.
//!
//! # Conflicts
//! The weekly grid allows one visible lesson per slot. When the computed
//! slot is already taken (typically after an overflow fallback), the slot
//! allocator looks for the next free slot from there; a full week leaves
//! the entry unplaced and reported.

use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

use super::allocator::OccupancyGrid;
use crate::config::ScheduleMode;
use crate::error::{PlanningResult, ResolutionIssue};
use crate::models::{
    resolve_subject_name, sorted_group, ScheduleTemplate, SlotRef, Subject, TimetableSettings,
    WeeklyLesson, YearlyLesson,
};
use crate::state::ChangeObserver;
use crate::store::{Stores, WeeklyLessonPatch};

/// Where a catalog entry belongs on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Template slot chosen by the placement rule.
    pub slot: SlotRef,
    /// Periods occupied: 2 for a structural double lesson, else 1.
    pub span: u32,
    /// Resolved subject display name.
    pub subject: String,
    /// Whether the lesson number exceeded the slot sequence.
    pub overflowed: bool,
}

impl Placement {
    /// Whether the placement starts a structural double lesson.
    pub fn is_double(&self) -> bool {
        self.span == 2
    }
}

/// Why an entry could not be placed by the placement rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementSkip {
    /// Subject reference does not resolve to a known subject.
    UnknownSubject(String),
    /// The template has no slot for (subject, class).
    NoTemplateSlots { subject: String, class_id: String },
    /// The entry is the declared second half of another entry's double lesson.
    AbsorbedInto(String),
}

impl fmt::Display for PlacementSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSubject(s) => write!(f, "subject '{s}' cannot be resolved"),
            Self::NoTemplateSlots { subject, class_id } => {
                write!(f, "template has no slot for '{subject}' in class '{class_id}'")
            }
            Self::AbsorbedInto(primary) => write!(f, "second half of double lesson '{primary}'"),
        }
    }
}

/// Inputs shared by every placement of one synchronization run.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    pub template: &'a ScheduleTemplate,
    pub subjects: &'a [Subject],
    pub settings: &'a TimetableSettings,
    /// All catalog entries relevant to the run.
    pub entries: &'a [YearlyLesson],
}

impl<'a> SyncContext<'a> {
    /// Highest period the allocator may use.
    pub fn slot_count(&self) -> u32 {
        self.template.max_period().max(self.settings.lessons_per_day)
    }
}

/// Applies the placement rule to one entry. Pure.
pub fn resolve_placement(
    entry: &YearlyLesson,
    template: &ScheduleTemplate,
    subjects: &[Subject],
    entries: &[YearlyLesson],
) -> Result<Placement, PlacementSkip> {
    let subject = resolve_subject_name(subjects, &entry.subject)
        .ok_or_else(|| PlacementSkip::UnknownSubject(entry.subject.clone()))?;

    let sequence = template.slot_sequence(subject, &entry.class_id);
    let Some(&last) = sequence.last() else {
        return Err(PlacementSkip::NoTemplateSlots {
            subject: subject.to_string(),
            class_id: entry.class_id.clone(),
        });
    };
    let slot_for = |lesson_number: u32| match sequence.get(lesson_number.saturating_sub(1) as usize) {
        Some(&slot) => (slot, false),
        None => (last, true),
    };

    let group = sorted_group(entries, &entry.subject, entry.week_number, &entry.class_id);
    let mut cursor = 0;
    while cursor < group.len() {
        let current = group[cursor];
        cursor += 1;
        let Some(next) = group.get(cursor) else {
            break;
        };
        let pairs = current.second_yearly_lesson_id.as_deref() == Some(next.id.as_str())
            && template.is_double_start(slot_for(current.lesson_number).0, subject, &entry.class_id);
        if pairs {
            if next.id == entry.id {
                return Err(PlacementSkip::AbsorbedInto(current.id.clone()));
            }
            cursor += 1;
        }
    }

    let (slot, overflowed) = slot_for(entry.lesson_number);
    let span = if template.is_double_start(slot, subject, &entry.class_id) {
        2
    } else {
        1
    };

    Ok(Placement {
        slot,
        span,
        subject: subject.to_string(),
        overflowed,
    })
}

/// Result of synchronizing one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A new weekly lesson was created.
    Created(WeeklyLesson),
    /// The existing weekly lesson was updated in place.
    Updated(WeeklyLesson),
    /// The entry is the second half of another entry's double lesson.
    AbsorbedIntoDouble { primary_id: String },
    /// The week is fully booked.
    Unplaced,
    /// Nothing was done (flexible mode or unresolvable entry).
    Skipped,
}

/// Outcome plus any resolution issues met on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub issues: Vec<ResolutionIssue>,
}

impl SyncReport {
    fn new(outcome: SyncOutcome, issues: Vec<ResolutionIssue>) -> Self {
        Self { outcome, issues }
    }

    /// The weekly lesson written, if any.
    pub fn lesson(&self) -> Option<&WeeklyLesson> {
        match &self.outcome {
            SyncOutcome::Created(l) | SyncOutcome::Updated(l) => Some(l),
            _ => None,
        }
    }
}

/// Keeps weekly lessons in step with catalog entries.
#[derive(Clone)]
pub struct LessonSynchronizer {
    stores: Stores,
    mode: ScheduleMode,
    observer: Arc<dyn ChangeObserver>,
}

impl LessonSynchronizer {
    /// Creates a synchronizer.
    pub fn new(stores: Stores, mode: ScheduleMode, observer: Arc<dyn ChangeObserver>) -> Self {
        Self {
            stores,
            mode,
            observer,
        }
    }

    /// Upserts the weekly lesson of one catalog entry.
    ///
    /// Unresolvable entries are skipped with a logged issue; only store
    /// failures are returned as errors.
    pub async fn sync_entry(
        &self,
        entry: &YearlyLesson,
        ctx: &SyncContext<'_>,
    ) -> PlanningResult<SyncReport> {
        if self.mode != ScheduleMode::FixedTemplate {
            return Ok(SyncReport::new(SyncOutcome::Skipped, Vec::new()));
        }

        let mut issues = Vec::new();
        let placement = match resolve_placement(entry, ctx.template, ctx.subjects, ctx.entries) {
            Ok(p) => p,
            Err(PlacementSkip::AbsorbedInto(primary_id)) => {
                debug!("entry {} is the second half of {}", entry.id, primary_id);
                return Ok(SyncReport::new(
                    SyncOutcome::AbsorbedIntoDouble { primary_id },
                    issues,
                ));
            }
            Err(skip) => {
                let message = skip.to_string();
                warn!("sync skipped entry {}: {}", entry.id, message);
                issues.push(
                    ResolutionIssue::new(message)
                        .for_entry(&entry.id)
                        .in_week(entry.week_number),
                );
                return Ok(SyncReport::new(SyncOutcome::Skipped, issues));
            }
        };

        if placement.overflowed {
            let group = sorted_group(ctx.entries, &entry.subject, entry.week_number, &entry.class_id);
            let message = format!(
                "lesson {} exceeds template capacity for '{}' ({} entries this week), using last slot",
                entry.lesson_number,
                placement.subject,
                group.len()
            );
            warn!("week {}: {}", entry.week_number, message);
            issues.push(
                ResolutionIssue::new(message)
                    .for_entry(&entry.id)
                    .in_week(entry.week_number),
            );
        }

        let week_lessons = self.stores.lessons_in_week(entry.week_number).await?;

        if let Some(existing) = week_lessons
            .iter()
            .find(|l| l.yearly_lesson_id.as_deref() == Some(entry.id.as_str()))
        {
            let here = SlotRef::new(existing.day_of_week, existing.period_slot);
            let mut span = 1;
            if ctx
                .template
                .is_double_start(here, &placement.subject, &entry.class_id)
            {
                let others: Vec<WeeklyLesson> = week_lessons
                    .iter()
                    .filter(|l| l.id != existing.id)
                    .cloned()
                    .collect();
                let grid = OccupancyGrid::for_week(&others, entry.week_number);
                if here.period < ctx.slot_count() && grid.is_available(here.day, here.period, 2) {
                    span = 2;
                } else {
                    let message = format!(
                        "next period after {} period {} is taken, kept as single lesson",
                        here.day, here.period
                    );
                    debug!("entry {}: {}", entry.id, message);
                    issues.push(
                        ResolutionIssue::new(message)
                            .for_entry(&entry.id)
                            .in_week(entry.week_number),
                    );
                }
            }
            let second_id = (span == 2)
                .then(|| entry.second_yearly_lesson_id.clone())
                .flatten();
            let (start, end) = ctx.settings.lesson_times(here.period, span).unzip();
            let patch = WeeklyLessonPatch {
                topic_id: Some(entry.topic_id.clone()),
                is_double_lesson: Some(span == 2),
                period_span: Some(span),
                second_yearly_lesson_id: Some(second_id),
                is_allerlei: Some(entry.is_allerlei),
                allerlei_subjects: Some(entry.allerlei_subjects.clone()),
                start_time: Some(start),
                end_time: Some(end),
                ..Default::default()
            };
            let updated = self.stores.lessons.update(&existing.id, &patch).await?;
            self.observer.lesson_updated(&updated);
            return Ok(SyncReport::new(SyncOutcome::Updated(updated), issues));
        }

        let grid = OccupancyGrid::for_week(&week_lessons, entry.week_number);
        let slot = if grid.is_available(placement.slot.day, placement.slot.period, placement.span) {
            placement.slot
        } else {
            match grid.find_free(
                placement.slot.day,
                ctx.slot_count(),
                placement.slot.period,
                placement.span,
            ) {
                Some(free) => {
                    let message = format!(
                        "slot {} period {} is taken, placed at {} period {}",
                        placement.slot.day, placement.slot.period, free.day, free.period
                    );
                    debug!("entry {}: {}", entry.id, message);
                    issues.push(
                        ResolutionIssue::new(message)
                            .for_entry(&entry.id)
                            .in_week(entry.week_number),
                    );
                    free
                }
                None => {
                    let message = "week is fully booked, entry left unplaced".to_string();
                    warn!("entry {}: {}", entry.id, message);
                    issues.push(
                        ResolutionIssue::new(message)
                            .for_entry(&entry.id)
                            .in_week(entry.week_number),
                    );
                    return Ok(SyncReport::new(SyncOutcome::Unplaced, issues));
                }
            }
        };

        let second_id = placement
            .is_double()
            .then(|| entry.second_yearly_lesson_id.clone())
            .flatten();
        let lesson = build_lesson(entry, &placement, slot, second_id, ctx.settings);
        let created = self.stores.lessons.create(lesson).await?;
        self.observer.lesson_created(&created);
        Ok(SyncReport::new(SyncOutcome::Created(created), issues))
    }

    /// Synchronizes several entries in lesson-number order, one at a time.
    pub async fn sync_entries(
        &self,
        entries: &[YearlyLesson],
        ctx: &SyncContext<'_>,
    ) -> PlanningResult<Vec<SyncReport>> {
        let mut ordered: Vec<&YearlyLesson> = entries.iter().collect();
        ordered.sort_by(|a, b| {
            (a.week_number, &a.subject, &a.class_id, a.lesson_number).cmp(&(
                b.week_number,
                &b.subject,
                &b.class_id,
                b.lesson_number,
            ))
        });

        let mut reports = Vec::with_capacity(ordered.len());
        for entry in ordered {
            reports.push(self.sync_entry(entry, ctx).await?);
        }
        Ok(reports)
    }
}

/// Builds a visible weekly lesson for an entry at `slot`.
pub(crate) fn build_lesson(
    entry: &YearlyLesson,
    placement: &Placement,
    slot: SlotRef,
    second_id: Option<String>,
    settings: &TimetableSettings,
) -> WeeklyLesson {
    let mut lesson = WeeklyLesson::new(String::new(), slot.day, slot.period, entry.week_number)
        .with_yearly_lesson(&entry.id)
        .with_subject(&placement.subject);
    if placement.is_double() {
        lesson = lesson.as_double(second_id);
    }
    lesson.topic_id = entry.topic_id.clone();
    lesson.is_allerlei = entry.is_allerlei;
    lesson.allerlei_subjects = entry.allerlei_subjects.clone();
    if let Some((start, end)) = settings.lesson_times(slot.period, placement.span) {
        lesson.start_time = Some(start);
        lesson.end_time = Some(end);
    }
    lesson
}
