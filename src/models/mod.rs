//! Timetable domain models.
//!
//! Provides the data types shared by every scheduling component: the
//! yearly lesson catalog, weekly grid lessons, the recurring template,
//! timing settings and merged-lesson groups.
//!
//! # Domain Mappings
//!
//! | u-timetable | Planner UI | Store collection |
//! |-------------|------------|------------------|
//! | YearlyLesson | Yearly plan lesson | `yearly_lessons` |
//! | WeeklyLesson | Timetable cell | `lessons` |
//! | AllerleiGroup | Mixed lesson | `allerlei_groups` |
//! | ScheduleTemplate | Fixed timetable | (read-only input) |

mod allerlei;
mod lesson;
mod settings;
mod subject;
mod template;
mod weekday;
mod yearly_lesson;

pub use allerlei::{AllerleiGroup, EntrySnapshot};
pub use lesson::WeeklyLesson;
pub use settings::TimetableSettings;
pub use subject::{resolve_subject_name, Subject};
pub use template::{ScheduleTemplate, SlotRef, TemplateSlot};
pub use weekday::{ParseWeekdayError, Weekday};
pub use yearly_lesson::{
    default_lesson_name, sorted_group, TeachingStep, YearlyLesson, WEEKS_PER_YEAR,
};
