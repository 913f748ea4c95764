//! Collection store contract.
//!
//! The scheduling engine never owns persistence. It talks to a networked
//! collection store through one statically typed repository per record
//! type, each offering the same five operations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Scheduling services (scheduler, planning)   │
//! └───────────────────┬──────────────────────────┘
//!                     │ Stores { yearly, lessons, groups }
//! ┌───────────────────▼──────────────────────────┐
//! │  Repository<T: Record> - typed contract      │
//! └───────────────────┬──────────────────────────┘
//!                     │
//!     ┌───────────────▼──────────────┐
//!     │  MemoryRepository (in-memory) │
//!     │  or a remote store client     │
//!     └──────────────────────────────┘
//! ```
//!
//! Every call is an awaited network round-trip in production; no local
//! cache is authoritative.

mod error;
mod filter;
pub mod memory;
mod record;
mod retry;

pub use error::{ErrorContext, StoreError, StoreResult};
pub use filter::{CompareOp, FieldValue, Filter};
pub use memory::MemoryRepository;
pub use record::{AllerleiGroupPatch, Record, WeeklyLessonPatch, YearlyLessonPatch};
pub use retry::retry_on_cancel;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{AllerleiGroup, WeeklyLesson, YearlyLesson};

/// Typed access to one collection.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Records matching the filter.
    async fn list(&self, filter: &Filter) -> StoreResult<Vec<T>>;

    /// Persists a new record. The store assigns the id when it is empty.
    async fn create(&self, record: T) -> StoreResult<T>;

    /// Applies a partial update and returns the updated record.
    async fn update(&self, id: &str, patch: &T::Patch) -> StoreResult<T>;

    /// Deletes a record.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Fetches one record, `None` if it does not exist.
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>>;
}

/// Repository of catalog entries (`yearly_lessons`).
pub type YearlyLessonRepository = dyn Repository<YearlyLesson>;
/// Repository of weekly grid lessons (`lessons`).
pub type WeeklyLessonRepository = dyn Repository<WeeklyLesson>;
/// Repository of merge groups (`allerlei_groups`).
pub type AllerleiGroupRepository = dyn Repository<AllerleiGroup>;

/// The three collections the engine operates on.
#[derive(Clone)]
pub struct Stores {
    pub yearly: Arc<YearlyLessonRepository>,
    pub lessons: Arc<WeeklyLessonRepository>,
    pub groups: Arc<AllerleiGroupRepository>,
}

impl Stores {
    /// Bundles three repositories.
    pub fn new(
        yearly: Arc<YearlyLessonRepository>,
        lessons: Arc<WeeklyLessonRepository>,
        groups: Arc<AllerleiGroupRepository>,
    ) -> Self {
        Self {
            yearly,
            lessons,
            groups,
        }
    }

    /// Weekly lessons of a calendar week.
    pub async fn lessons_in_week(&self, week_number: u32) -> StoreResult<Vec<WeeklyLesson>> {
        self.lessons
            .list(&Filter::eq("week_number", week_number))
            .await
    }
}

/// Handles to in-memory repositories, for local development and tests.
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub yearly: Arc<MemoryRepository<YearlyLesson>>,
    pub lessons: Arc<MemoryRepository<WeeklyLesson>>,
    pub groups: Arc<MemoryRepository<AllerleiGroup>>,
}

impl MemoryStores {
    /// Empty in-memory stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory stores seeded with catalog entries and weekly lessons.
    pub fn seeded(yearly: Vec<YearlyLesson>, lessons: Vec<WeeklyLesson>) -> Self {
        Self {
            yearly: MemoryRepository::with_records(yearly),
            lessons: MemoryRepository::with_records(lessons),
            groups: Arc::new(MemoryRepository::new()),
        }
    }

    /// Type-erased view for the scheduling services.
    pub fn stores(&self) -> Stores {
        Stores::new(
            self.yearly.clone(),
            self.lessons.clone(),
            self.groups.clone(),
        )
    }
}
