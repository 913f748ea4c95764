//! Batch schedule generation from the recurring template.
//!
//! # Algorithm
//!
//! For each configured week:
//!
//! 1. Skip the week if it already has a visible lesson (never overwrites).
//! 2. Skip the week if it has no catalog entries.
//! 3. Group the week's entries by (subject, class), sorted by lesson number.
//! 4. Walk each group with a cursor, placing entry `n` on template slot
//!    `n - 1` (last slot on overflow). A structural double lesson takes two
//!    periods, and when the next entry is the declared second half the
//!    cursor skips it.
//! 5. A placement colliding with an already planned lesson is relocated
//!    with the alternative-slot search; a full week leaves it unplaced.
//!
//! Planning is pure. Creation then runs in batches with a short pause
//! between them; failed creates are reported and later batches still run.

use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::allocator::OccupancyGrid;
use super::progress::{GenerationProgress, ProgressSender};
use super::sync::{build_lesson, Placement};
use crate::config::GeneratorConfig;
use crate::error::{OperationFailure, PlanningResult, ResolutionIssue};
use crate::models::{
    resolve_subject_name, ScheduleTemplate, Subject, TimetableSettings, WeeklyLesson, YearlyLesson,
};
use crate::state::{ChangeObserver, NoopObserver};
use crate::store::{Filter, Stores};

/// Read-only inputs of one generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub template: &'a ScheduleTemplate,
    pub subjects: &'a [Subject],
    pub settings: &'a TimetableSettings,
    /// The yearly catalog.
    pub catalog: &'a [YearlyLesson],
    /// Weekly lessons already in the store.
    pub existing: &'a [WeeklyLesson],
}

/// Counters of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Weeks that were planned.
    pub weeks_processed: usize,
    /// Weeks skipped because they already had visible lessons.
    pub skipped_weeks: Vec<u32>,
    /// Weeks skipped because they had no catalog entries.
    pub skipped_empty_weeks: usize,
    /// Lessons planned for creation.
    pub lessons_planned: usize,
    /// Planned lessons spanning two periods.
    pub double_lessons: usize,
    /// Entries whose lesson number exceeded the template capacity.
    pub overflow_entries: usize,
    /// Placements moved to another slot after a collision.
    pub relocated: usize,
    /// Entries with no free slot left in their week.
    pub unplaced: usize,
    /// (subject, class) pairs without template slots.
    pub missing_template: Vec<(String, String)>,
    /// Creates the store rejected.
    pub failed_creates: usize,
}

/// Output of the planning phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationPlan {
    /// Lessons to create, in week order.
    pub lessons: Vec<WeeklyLesson>,
    pub stats: GenerationStats,
    pub issues: Vec<ResolutionIssue>,
}

/// Result of a generation run: best effort, fully reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    pub created: Vec<WeeklyLesson>,
    pub failures: Vec<OperationFailure>,
    pub stats: GenerationStats,
    pub issues: Vec<ResolutionIssue>,
}

/// Fills empty weeks from the template.
///
/// # Example
///
/// ```
/// use u_timetable::config::GeneratorConfig;
/// use u_timetable::models::{ScheduleTemplate, Subject, TimetableSettings, Weekday, YearlyLesson};
/// use u_timetable::scheduler::{GenerationInput, ScheduleGenerator};
/// use u_timetable::store::MemoryStores;
///
/// let template = ScheduleTemplate::new()
///     .with_slot(Weekday::Monday, 1, "Math", "A")
///     .with_slot(Weekday::Thursday, 3, "Math", "A");
/// let subjects = vec![Subject::new("math", "Math", "A")];
/// let settings = TimetableSettings::default();
/// let catalog = vec![
///     YearlyLesson::new("m1", "math", 1, 1).with_class("A"),
///     YearlyLesson::new("m2", "math", 1, 2).with_class("A"),
/// ];
///
/// let mem = MemoryStores::new();
/// let config = GeneratorConfig {
///     batch_size: 10,
///     batch_delay_ms: 0,
///     first_week: 1,
///     last_week: 1,
/// };
/// let generator = ScheduleGenerator::new(mem.stores(), config);
/// let input = GenerationInput {
///     template: &template,
///     subjects: &subjects,
///     settings: &settings,
///     catalog: &catalog,
///     existing: &[],
/// };
///
/// let report = futures::executor::block_on(generator.generate(&input));
/// assert_eq!(report.created.len(), 2);
/// assert_eq!(report.created[1].day_of_week, Weekday::Thursday);
/// assert_eq!(mem.lessons.len(), 2);
/// ```
pub struct ScheduleGenerator {
    stores: Stores,
    config: GeneratorConfig,
    observer: Arc<dyn ChangeObserver>,
    progress: Option<ProgressSender>,
}

impl ScheduleGenerator {
    /// Creates a generator.
    pub fn new(stores: Stores, config: GeneratorConfig) -> Self {
        Self {
            stores,
            config,
            observer: Arc::new(NoopObserver),
            progress: None,
        }
    }

    /// Notifies `observer` of each created lesson.
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Emits progress events on `sender`.
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    fn emit(&self, event: GenerationProgress) {
        if let Some(tx) = &self.progress {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Plans all lessons to create. Pure apart from progress events.
    pub fn plan(&self, input: &GenerationInput<'_>) -> GenerationPlan {
        let mut plan = GenerationPlan::default();
        let slot_count = input
            .template
            .max_period()
            .max(input.settings.lessons_per_day);
        let weeks_total = (self.config.first_week..=self.config.last_week).count() as u32;

        for (done, week) in (self.config.first_week..=self.config.last_week).enumerate() {
            plan_week(week, input, slot_count, &mut plan);
            self.emit(GenerationProgress::Planned {
                week_number: week,
                weeks_done: done as u32 + 1,
                weeks_total,
            });
        }
        plan.stats.lessons_planned = plan.lessons.len();
        plan
    }

    /// Plans and creates lessons for every empty week.
    pub async fn generate(&self, input: &GenerationInput<'_>) -> GenerationReport {
        let plan = self.plan(input);
        info!(
            "generation planned {} lessons over {} weeks ({} skipped as already scheduled)",
            plan.stats.lessons_planned,
            plan.stats.weeks_processed,
            plan.stats.skipped_weeks.len()
        );

        let total = plan.lessons.len();
        let mut report = GenerationReport {
            created: Vec::with_capacity(total),
            failures: Vec::new(),
            stats: plan.stats,
            issues: plan.issues,
        };

        let batch_size = self.config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);
        for (index, batch) in plan.lessons.chunks(batch_size).enumerate() {
            let results =
                join_all(batch.iter().cloned().map(|l| self.stores.lessons.create(l))).await;
            for (planned, result) in batch.iter().zip(results) {
                match result {
                    Ok(created) => {
                        self.observer.lesson_created(&created);
                        report.created.push(created);
                    }
                    Err(error) => {
                        warn!(
                            "create failed for week {} {} period {}: {}",
                            planned.week_number, planned.day_of_week, planned.period_slot, error
                        );
                        report.failures.push(OperationFailure {
                            record_id: planned.yearly_lesson_id.clone().unwrap_or_default(),
                            error,
                        });
                    }
                }
            }
            self.emit(GenerationProgress::Created {
                done: report.created.len() + report.failures.len(),
                total,
            });
            if index + 1 < batch_count && self.config.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        report.stats.failed_creates = report.failures.len();
        info!(
            "generation finished: {} created, {} failed",
            report.created.len(),
            report.failures.len()
        );
        self.emit(GenerationProgress::Finished {
            created: report.created.len(),
            failed: report.failures.len(),
        });
        report
    }

    /// Loads the catalog and existing lessons from the store, then generates.
    pub async fn generate_from_store(
        &self,
        template: &ScheduleTemplate,
        subjects: &[Subject],
        settings: &TimetableSettings,
    ) -> PlanningResult<GenerationReport> {
        let catalog = self.stores.yearly.list(&Filter::All).await?;
        let existing = self.stores.lessons.list(&Filter::All).await?;
        let input = GenerationInput {
            template,
            subjects,
            settings,
            catalog: &catalog,
            existing: &existing,
        };
        Ok(self.generate(&input).await)
    }
}

fn plan_week(week: u32, input: &GenerationInput<'_>, slot_count: u32, plan: &mut GenerationPlan) {
    if input
        .existing
        .iter()
        .any(|l| l.week_number == week && l.is_visible())
    {
        debug!("week {week} already has lessons, skipping");
        plan.stats.skipped_weeks.push(week);
        return;
    }

    let mut groups: BTreeMap<(&str, &str), Vec<&YearlyLesson>> = BTreeMap::new();
    for entry in input.catalog.iter().filter(|e| e.week_number == week) {
        groups
            .entry((entry.subject.as_str(), entry.class_id.as_str()))
            .or_default()
            .push(entry);
    }
    if groups.is_empty() {
        plan.stats.skipped_empty_weeks += 1;
        return;
    }
    plan.stats.weeks_processed += 1;

    let mut grid = OccupancyGrid::for_week(input.existing, week);
    for ((subject_ref, class_id), mut group) in groups {
        group.sort_by_key(|e| e.lesson_number);

        let Some(subject) = resolve_subject_name(input.subjects, subject_ref) else {
            warn!("week {week}: subject '{subject_ref}' cannot be resolved, skipping");
            plan.issues.push(
                ResolutionIssue::new(format!("subject '{subject_ref}' cannot be resolved"))
                    .in_week(week),
            );
            continue;
        };

        let sequence = input.template.slot_sequence(subject, class_id);
        let Some(&last) = sequence.last() else {
            warn!("week {week}: no template slots for '{subject}' in class '{class_id}'");
            let pair = (subject.to_string(), class_id.to_string());
            if !plan.stats.missing_template.contains(&pair) {
                plan.stats.missing_template.push(pair);
            }
            continue;
        };

        let mut cursor = 0;
        while cursor < group.len() {
            let entry = group[cursor];
            cursor += 1;

            let index = entry.lesson_number.saturating_sub(1) as usize;
            let (slot, overflowed) = match sequence.get(index) {
                Some(&slot) => (slot, false),
                None => (last, true),
            };
            if overflowed {
                plan.stats.overflow_entries += 1;
                warn!(
                    "week {week}: lesson {} of '{subject}' exceeds template capacity",
                    entry.lesson_number
                );
                plan.issues.push(
                    ResolutionIssue::new("lesson number exceeds template capacity, using last slot")
                        .for_entry(&entry.id)
                        .in_week(week),
                );
            }

            let span = if input.template.is_double_start(slot, subject, class_id) {
                2
            } else {
                1
            };
            let mut second_id = None;
            if span == 2 {
                if let (Some(declared), Some(next)) =
                    (entry.second_yearly_lesson_id.as_deref(), group.get(cursor))
                {
                    if next.id == declared {
                        second_id = Some(next.id.clone());
                        cursor += 1;
                    }
                }
            }

            let target = if grid.is_available(slot.day, slot.period, span) {
                slot
            } else {
                match grid.find_alternative(slot.day, slot_count, slot.period, span) {
                    Some(alternative) => {
                        plan.stats.relocated += 1;
                        debug!(
                            "week {week}: entry {} moved from {} {} to {} {}",
                            entry.id, slot.day, slot.period, alternative.day, alternative.period
                        );
                        plan.issues.push(
                            ResolutionIssue::new(format!(
                                "slot {} period {} taken, relocated to {} period {}",
                                slot.day, slot.period, alternative.day, alternative.period
                            ))
                            .for_entry(&entry.id)
                            .in_week(week),
                        );
                        alternative
                    }
                    None => {
                        plan.stats.unplaced += 1;
                        warn!("week {week}: no free slot left for entry {}", entry.id);
                        plan.issues.push(
                            ResolutionIssue::new("week is fully booked, entry left unplaced")
                                .for_entry(&entry.id)
                                .in_week(week),
                        );
                        continue;
                    }
                }
            };

            grid.occupy(target.day, target.period, span);
            if span == 2 {
                plan.stats.double_lessons += 1;
            }
            let placement = Placement {
                slot,
                span,
                subject: subject.to_string(),
                overflowed,
            };
            plan.lessons
                .push(build_lesson(entry, &placement, target, second_id, input.settings));
        }
    }
}
