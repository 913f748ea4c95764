//! Template-driven lesson placement.
//!
//! # Components
//!
//! - **Slot allocator** (`allocator`): free-slot search over a week's
//!   visible lessons, with the conflict-resolution variant.
//! - **Lesson synchronizer** (`sync`): idempotent upsert of one catalog
//!   entry's weekly lesson from the template's slot sequence.
//! - **Schedule generator** (`generator`): fills every empty week of the
//!   year from the template in throttled batches, reporting progress.
//!
//! # Placement Rule
//!
//! Lesson number `n` of a (subject, class) in a week takes the `n`-th slot
//! of that pair's template sequence, sorted by (weekday, period). Two
//! consecutive slots of the same pair on one day form a double lesson.

mod allocator;
mod generator;
mod progress;
mod sync;

pub use allocator::{find_alternative_slot, find_free_slot, is_slot_available, OccupancyGrid};
pub use generator::{
    GenerationInput, GenerationPlan, GenerationReport, GenerationStats, ScheduleGenerator,
};
pub use progress::{progress_channel, GenerationProgress, ProgressSender};
pub use sync::{
    resolve_placement, LessonSynchronizer, Placement, PlacementSkip, SyncContext, SyncOutcome,
    SyncReport,
};

pub(crate) use sync::build_lesson;
