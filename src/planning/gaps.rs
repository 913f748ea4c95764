//! Gap filling for topic runs.
//!
//! A topic assigned to lessons 2 and 4 of a subject's week leaves lesson 3
//! out of the run; the merged-block view needs a contiguous run. The gaps
//! of (week, subject, topic) are the numbers in `[min, max]` missing from
//! the topic's lesson numbers.
//!
//! Filling a gap either re-topics the entry that already holds that
//! lesson number, or synthesizes a placeholder entry ("Lektion n", empty
//! notes and steps) for it. Placeholders are created optimistically:
//! observers see a temporary entry immediately, confirmed or discarded
//! when the store answers.

use futures::future::join_all;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::OperationFailure;
use crate::models::YearlyLesson;
use crate::state::{ChangeObserver, CorrelationId};
use crate::store::{Stores, YearlyLessonPatch};
use crate::validation::assert_catalog_invariants;

/// Missing lesson numbers of a topic run, ascending.
///
/// Returns an empty list when fewer than two entries carry the topic.
pub fn find_gaps(entries: &[YearlyLesson], week_number: u32, subject: &str, topic_id: &str) -> Vec<u32> {
    let numbers: BTreeSet<u32> = entries
        .iter()
        .filter(|e| e.week_number == week_number && e.subject == subject && e.has_topic(topic_id))
        .map(|e| e.lesson_number)
        .collect();

    let (Some(&min), Some(&max)) = (numbers.first(), numbers.last()) else {
        return Vec::new();
    };
    (min..=max).filter(|n| !numbers.contains(n)).collect()
}

/// Outcome of a gap fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapFillReport {
    /// Placeholder entries created by the store.
    pub created: Vec<YearlyLesson>,
    /// Existing entries moved into the topic run.
    pub retopiced: Vec<YearlyLesson>,
    /// Writes the store rejected.
    pub failures: Vec<OperationFailure>,
}

impl GapFillReport {
    /// Whether nothing was changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.retopiced.is_empty()
    }
}

/// Closes topic-run gaps in the catalog.
pub struct GapFiller {
    stores: Stores,
    observer: Arc<dyn ChangeObserver>,
}

impl GapFiller {
    pub fn new(stores: Stores, observer: Arc<dyn ChangeObserver>) -> Self {
        Self { stores, observer }
    }

    /// Fills every gap of (week, subject, topic) found in `entries`.
    ///
    /// `entries` should hold at least the subject's entries of the week.
    pub async fn fill_gaps(
        &self,
        entries: &[YearlyLesson],
        week_number: u32,
        subject: &str,
        topic_id: &str,
    ) -> GapFillReport {
        let mut report = GapFillReport::default();
        let run: Vec<&YearlyLesson> = entries
            .iter()
            .filter(|e| e.week_number == week_number && e.subject == subject && e.has_topic(topic_id))
            .collect();
        if run.len() < 2 {
            return report;
        }
        let gaps = find_gaps(entries, week_number, subject, topic_id);
        if gaps.is_empty() {
            return report;
        }
        debug!("week {week_number} '{subject}' topic '{topic_id}': filling gaps {gaps:?}");

        // Class and school year come from the run itself.
        let model = run[0];
        let mut placeholders = Vec::new();
        let mut retopic = Vec::new();
        for number in gaps {
            let holder = entries.iter().find(|e| {
                e.in_group(subject, week_number, &model.class_id) && e.lesson_number == number
            });
            match holder {
                Some(existing) => retopic.push(existing.id.clone()),
                None => {
                    let op = CorrelationId::new();
                    let temp = YearlyLesson::new(op.temp_record_id(), subject, week_number, number)
                        .with_class(&model.class_id)
                        .with_school_year(&model.school_year)
                        .with_topic(topic_id);
                    self.observer.pending_begin(op, &temp);
                    placeholders.push((op, temp));
                }
            }
        }

        let topic_patch = YearlyLessonPatch {
            topic_id: Some(Some(topic_id.to_string())),
            ..Default::default()
        };
        let updates = join_all(
            retopic
                .iter()
                .map(|id| self.stores.yearly.update(id, &topic_patch)),
        );
        let creates = join_all(placeholders.iter().map(|(_, temp)| {
            let mut record = temp.clone();
            record.id.clear();
            self.stores.yearly.create(record)
        }));
        let (updated, created) = futures::join!(updates, creates);

        for (id, result) in retopic.into_iter().zip(updated) {
            match result {
                Ok(entry) => {
                    self.observer.entry_updated(&entry);
                    report.retopiced.push(entry);
                }
                Err(error) => {
                    warn!("gap fill: re-topic of {id} failed: {error}");
                    report.failures.push(OperationFailure {
                        record_id: id,
                        error,
                    });
                }
            }
        }
        for ((op, temp), result) in placeholders.into_iter().zip(created) {
            match result {
                Ok(entry) => {
                    self.observer.pending_confirm(op, &entry);
                    report.created.push(entry);
                }
                Err(error) => {
                    warn!("gap fill: placeholder {} failed: {error}", temp.lesson_number);
                    self.observer.pending_discard(op);
                    report.failures.push(OperationFailure {
                        record_id: temp.id,
                        error,
                    });
                }
            }
        }

        let mut after: Vec<YearlyLesson> = entries
            .iter()
            .filter(|e| !report.retopiced.iter().any(|r| r.id == e.id))
            .cloned()
            .collect();
        after.extend(report.retopiced.iter().cloned());
        after.extend(report.created.iter().cloned());
        assert_catalog_invariants(&after, "gap fill");
        report
    }
}
