//! End-to-end scheduling properties against the in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;

use u_timetable::config::{GeneratorConfig, RetryPolicy, ScheduleMode};
use u_timetable::models::{
    ScheduleTemplate, SlotRef, Subject, TeachingStep, TimetableSettings, WeeklyLesson, Weekday,
    YearlyLesson,
};
use u_timetable::planning::{
    find_gaps, AllerleiSelection, AllerleiService, GapFiller, IntegrateRequest,
};
use u_timetable::scheduler::{
    find_free_slot, LessonSynchronizer, ScheduleGenerator, SyncContext, SyncOutcome,
};
use u_timetable::state::{NoopObserver, StateMirror};
use u_timetable::store::MemoryStores;
use u_timetable::validation::validate_slot_occupancy;

fn subjects() -> Vec<Subject> {
    vec![
        Subject::new("math", "Math", "A"),
        Subject::new("ger", "German", "A"),
        Subject::new("art", "Art", "A"),
    ]
}

fn weekly_template() -> ScheduleTemplate {
    ScheduleTemplate::new()
        .with_slot(Weekday::Monday, 1, "Math", "A")
        .with_slot(Weekday::Monday, 2, "Math", "A")
        .with_slot(Weekday::Monday, 3, "German", "A")
        .with_slot(Weekday::Tuesday, 1, "German", "A")
        .with_slot(Weekday::Wednesday, 2, "Math", "A")
        .with_slot(Weekday::Thursday, 5, "Art", "A")
        .with_slot(Weekday::Thursday, 6, "Art", "A")
        .with_slot(Weekday::Friday, 4, "German", "A")
}

fn week_catalog(week: u32) -> Vec<YearlyLesson> {
    let id = |s: &str, n: u32| format!("{s}-{week}-{n}");
    vec![
        YearlyLesson::new(id("math", 1), "math", week, 1)
            .with_class("A")
            .with_second_half(id("math", 2)),
        YearlyLesson::new(id("math", 2), "math", week, 2).with_class("A"),
        YearlyLesson::new(id("math", 3), "math", week, 3).with_class("A"),
        YearlyLesson::new(id("math", 4), "math", week, 4).with_class("A"),
        YearlyLesson::new(id("ger", 1), "ger", week, 1).with_class("A"),
        YearlyLesson::new(id("ger", 2), "ger", week, 2).with_class("A"),
        YearlyLesson::new(id("ger", 3), "ger", week, 3).with_class("A"),
        YearlyLesson::new(id("art", 1), "art", week, 1).with_class("A"),
        YearlyLesson::new(id("art", 2), "art", week, 2).with_class("A"),
    ]
}

fn generator_config(last_week: u32) -> GeneratorConfig {
    GeneratorConfig {
        batch_size: 20,
        batch_delay_ms: 0,
        first_week: 1,
        last_week,
    }
}

#[tokio::test]
async fn generated_weeks_have_unique_visible_slots() {
    let catalog: Vec<YearlyLesson> = (1..=4).flat_map(week_catalog).collect();
    let mem = MemoryStores::seeded(catalog, Vec::new());
    let generator = ScheduleGenerator::new(mem.stores(), generator_config(4));
    let (template, subjects, settings) = (weekly_template(), subjects(), TimetableSettings::default());

    let report = generator
        .generate_from_store(&template, &subjects, &settings)
        .await
        .unwrap();
    assert!(report.failures.is_empty());
    assert!(report.stats.overflow_entries > 0);
    assert!(validate_slot_occupancy(&mem.lessons.snapshot()).is_ok());
}

#[tokio::test]
async fn generator_is_idempotent_on_scheduled_weeks() {
    let catalog: Vec<YearlyLesson> = (1..=3).flat_map(week_catalog).collect();
    let mem = MemoryStores::seeded(catalog, Vec::new());
    let generator = ScheduleGenerator::new(mem.stores(), generator_config(5));
    let (template, subjects, settings) = (weekly_template(), subjects(), TimetableSettings::default());

    let first = generator
        .generate_from_store(&template, &subjects, &settings)
        .await
        .unwrap();
    let count = mem.lessons.len();
    assert_eq!(first.created.len(), count);
    assert_eq!(first.stats.skipped_empty_weeks, 2);

    let second = generator
        .generate_from_store(&template, &subjects, &settings)
        .await
        .unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.stats.skipped_weeks, vec![1, 2, 3]);
    assert_eq!(mem.lessons.len(), count);
}

#[tokio::test]
async fn synchronizer_places_nth_lesson_on_nth_slot() {
    let mem = MemoryStores::new();
    let sync = LessonSynchronizer::new(mem.stores(), ScheduleMode::FixedTemplate, Arc::new(NoopObserver));
    let (template, subjects, settings) = (weekly_template(), subjects(), TimetableSettings::default());
    let entries: Vec<YearlyLesson> = (1..=3)
        .map(|n| YearlyLesson::new(format!("g{n}"), "ger", 10, n).with_class("A"))
        .collect();
    let ctx = SyncContext {
        template: &template,
        subjects: &subjects,
        settings: &settings,
        entries: &entries,
    };

    let expected = [
        SlotRef::new(Weekday::Monday, 3),
        SlotRef::new(Weekday::Tuesday, 1),
        SlotRef::new(Weekday::Friday, 4),
    ];
    for _ in 0..2 {
        let reports = sync.sync_entries(&entries, &ctx).await.unwrap();
        for (report, slot) in reports.iter().zip(expected) {
            let lesson = report.lesson().unwrap();
            assert_eq!(SlotRef::new(lesson.day_of_week, lesson.period_slot), slot);
        }
    }
    assert_eq!(mem.lessons.len(), 3);

    let again = sync.sync_entry(&entries[0], &ctx).await.unwrap();
    assert!(matches!(again.outcome, SyncOutcome::Updated(_)));
    assert_eq!(mem.lessons.len(), 3);
}

#[test]
fn double_lesson_needs_same_subject_and_class() {
    let paired = ScheduleTemplate::new()
        .with_slot(Weekday::Monday, 1, "Math", "A")
        .with_slot(Weekday::Monday, 2, "Math", "A");
    let first = SlotRef::new(Weekday::Monday, 1);
    assert!(paired.is_double_start(first, "Math", "A"));
    assert!(paired.is_double_end(SlotRef::new(Weekday::Monday, 2), "Math", "A"));

    let other_subject = ScheduleTemplate::new()
        .with_slot(Weekday::Monday, 1, "Math", "A")
        .with_slot(Weekday::Monday, 2, "German", "A");
    assert!(!other_subject.is_double_start(first, "Math", "A"));

    let other_class = ScheduleTemplate::new()
        .with_slot(Weekday::Monday, 1, "Math", "A")
        .with_slot(Weekday::Monday, 2, "Math", "B");
    assert!(!other_class.is_double_start(first, "Math", "A"));
}

#[tokio::test]
async fn gap_fill_closes_topic_run() {
    let entries = vec![
        YearlyLesson::new("e2", "math", 12, 2).with_class("A").with_topic("T"),
        YearlyLesson::new("e4", "math", 12, 4).with_class("A").with_topic("T"),
    ];
    assert_eq!(find_gaps(&entries, 12, "math", "T"), vec![3]);

    let mem = MemoryStores::seeded(entries.clone(), Vec::new());
    let mirror = Arc::new(StateMirror::new());
    let filler = GapFiller::new(mem.stores(), mirror.clone());
    filler.fill_gaps(&entries, 12, "math", "T").await;

    let numbers: BTreeSet<u32> = mem
        .yearly
        .snapshot()
        .iter()
        .filter(|e| e.has_topic("T"))
        .map(|e| e.lesson_number)
        .collect();
    assert_eq!(numbers, BTreeSet::from([2, 3, 4]));
    assert!(mirror.snapshot().pending.is_empty());
}

#[tokio::test]
async fn merge_then_unlink_restores_entries() {
    let primary = YearlyLesson::new("p", "math", 20, 3)
        .with_class("A")
        .with_notes("x")
        .with_step(TeachingStep::new("s1", "intro"));
    assert_eq!(primary.name, "Lektion 3");
    let donor = YearlyLesson::new("d", "ger", 20, 1).with_class("A").with_notes("y");
    let lessons = vec![
        WeeklyLesson::new("lp", Weekday::Wednesday, 2, 20).with_yearly_lesson("p"),
        WeeklyLesson::new("ld", Weekday::Tuesday, 1, 20).with_yearly_lesson("d"),
    ];
    let before = vec![primary.clone(), donor.clone()];
    let mem = MemoryStores::seeded(before.clone(), lessons);
    let service = AllerleiService::new(
        mem.stores(),
        TimetableSettings::default(),
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        },
        Arc::new(NoopObserver),
    );

    let merged = service
        .integrate(&IntegrateRequest {
            primary: Some(AllerleiSelection::new("Math", Some("p"))),
            selections: vec![AllerleiSelection::new("German", Some("d"))],
            week_number: 20,
            block_lesson_id: None,
        })
        .await
        .unwrap();
    assert!(mem.yearly.snapshot().iter().all(|e| e.is_allerlei));

    service.unlink(&merged.group.id).await.unwrap();
    let after = mem.yearly.snapshot();
    for original in &before {
        let restored = after.iter().find(|e| e.id == original.id).unwrap();
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.notes, original.notes);
        assert_eq!(restored.steps, original.steps);
        assert!(!restored.is_allerlei);
    }
    let visible: Vec<WeeklyLesson> = mem
        .lessons
        .snapshot()
        .into_iter()
        .filter(|l| l.is_visible())
        .collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].yearly_lesson_id.as_deref(), Some("p"));
    assert!(mem.groups.is_empty());
}

#[test]
fn allocator_moves_to_tuesday_when_monday_is_full() {
    let lessons: Vec<WeeklyLesson> = (1..=8)
        .map(|p| WeeklyLesson::new(format!("m{p}"), Weekday::Monday, p, 30))
        .collect();
    assert_eq!(
        find_free_slot(&lessons, Weekday::Monday, 8, 30, 1),
        Some(SlotRef::new(Weekday::Tuesday, 1))
    );
}
