//! In-memory collection store.
//!
//! `MemoryRepository` implements [`Repository`] over a process-local
//! record list. It is used for local development and tests, and can
//! inject cancellation errors to exercise retry paths.
//!
//! Record ids follow the store's format: 15 lowercase alphanumerics.

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ErrorContext, Filter, Record, Repository, StoreError, StoreResult};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 15;

/// Generates a store-style record id.
pub fn generate_record_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Call counters, for asserting how a component used the store.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list: AtomicUsize,
    pub create: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
    pub find_by_id: AtomicUsize,
}

/// In-memory repository for one record type.
#[derive(Debug)]
pub struct MemoryRepository<T: Record> {
    records: RwLock<Vec<T>>,
    /// Remaining injected cancellations for updates, per record id.
    cancel_updates: RwLock<HashMap<String, usize>>,
    /// Remaining injected failures for creates.
    fail_creates: AtomicUsize,
    calls: CallCounts,
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            cancel_updates: RwLock::new(HashMap::new()),
            fail_creates: AtomicUsize::new(0),
            calls: CallCounts::default(),
        }
    }
}

impl<T: Record> MemoryRepository<T> {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared repository pre-filled with records.
    ///
    /// Records with an empty id get a generated one.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Arc<Self> {
        let repo = Self::new();
        {
            let mut guard = repo.records.write();
            for mut record in records {
                if record.id().is_empty() {
                    record.set_id(generate_record_id());
                }
                guard.push(record);
            }
        }
        Arc::new(repo)
    }

    /// Snapshot of all records in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.records.read().clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Makes the next `times` updates of `id` fail with a cancellation.
    pub fn cancel_next_updates(&self, id: impl Into<String>, times: usize) {
        self.cancel_updates.write().insert(id.into(), times);
    }

    /// Makes the next `times` creates fail with a transport error.
    pub fn fail_next_creates(&self, times: usize) {
        self.fail_creates.store(times, Ordering::SeqCst);
    }

    /// Call counters.
    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    fn context(operation: &str) -> ErrorContext {
        ErrorContext::new(operation).with_collection(T::COLLECTION)
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn list(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read();
        let mut out = Vec::new();
        for record in records.iter() {
            let matched = filter.matches(record).map_err(|field| {
                StoreError::invalid_filter(
                    format!("unknown field '{field}'"),
                    Self::context("list").with_details(filter.to_string()),
                )
            })?;
            if matched {
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    async fn create(&self, mut record: T) -> StoreResult<T> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::transport(
                "injected create failure",
                Self::context("create"),
            ));
        }

        let mut records = self.records.write();
        if record.id().is_empty() {
            record.set_id(generate_record_id());
        } else if records.iter().any(|r| r.id() == record.id()) {
            return Err(StoreError::conflict(
                "record id already exists",
                Self::context("create").with_record_id(record.id()),
            ));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &T::Patch) -> StoreResult<T> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        {
            let mut cancels = self.cancel_updates.write();
            if let Some(remaining) = cancels.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::cancelled(
                        "request was superseded",
                        Self::context("update").with_record_id(id),
                    ));
                }
            }
        }

        let mut records = self.records.write();
        let record = records.iter_mut().find(|r| r.id() == id).ok_or_else(|| {
            StoreError::not_found("record missing", Self::context("update").with_record_id(id))
        })?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(StoreError::not_found(
                "record missing",
                Self::context("delete").with_record_id(id),
            ));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        self.calls.find_by_id.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().iter().find(|r| r.id() == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WeeklyLesson, Weekday, YearlyLesson};
    use crate::store::YearlyLessonPatch;

    #[test]
    fn test_generated_id_shape() {
        let id = generate_record_id();
        assert_eq!(id.len(), 15);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let repo = MemoryRepository::<YearlyLesson>::new();
        let created = repo
            .create(YearlyLesson::new("", "math", 1, 1))
            .await
            .unwrap();
        assert_eq!(created.id.len(), 15);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_conflicts() {
        let repo = MemoryRepository::with_records(vec![YearlyLesson::new("y1", "math", 1, 1)]);
        let err = repo
            .create(YearlyLesson::new("y1", "math", 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let repo = MemoryRepository::with_records(vec![
            WeeklyLesson::new("a", Weekday::Monday, 1, 1),
            WeeklyLesson::new("b", Weekday::Monday, 2, 2),
            WeeklyLesson::new("c", Weekday::Friday, 1, 1).hidden(),
        ]);
        let visible = repo
            .list(&Filter::eq("week_number", 1u32).and(Filter::eq("is_hidden", false)))
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "a");

        let err = repo.list(&Filter::eq("room", "B1")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter { .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = MemoryRepository::with_records(vec![YearlyLesson::new("y1", "math", 1, 1)]);
        let updated = repo
            .update(
                "y1",
                &YearlyLessonPatch {
                    notes: Some("n".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes, "n");

        repo.delete("y1").await.unwrap();
        assert!(repo.find_by_id("y1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("y1").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_injected_cancellation() {
        let repo = MemoryRepository::with_records(vec![YearlyLesson::new("y1", "math", 1, 1)]);
        repo.cancel_next_updates("y1", 2);
        let patch = YearlyLessonPatch::default();
        assert!(repo.update("y1", &patch).await.unwrap_err().is_cancellation());
        assert!(repo.update("y1", &patch).await.unwrap_err().is_cancellation());
        assert!(repo.update("y1", &patch).await.is_ok());
        assert_eq!(repo.calls().update.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_injected_create_failure() {
        let repo = MemoryRepository::<YearlyLesson>::new();
        repo.fail_next_creates(1);
        assert!(repo.create(YearlyLesson::new("", "m", 1, 1)).await.is_err());
        assert!(repo.create(YearlyLesson::new("", "m", 1, 1)).await.is_ok());
        assert_eq!(repo.len(), 1);
    }
}
