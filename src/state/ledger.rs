//! Pending-operation ledger.
//!
//! Optimistic creates are recorded under a generated correlation id with a
//! temporary record. When the store answers, the temporary record is
//! either confirmed (replaced by the stored record) or discarded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Correlation id of one in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Id given to the temporary record of this operation.
    pub fn temp_record_id(&self) -> String {
        format!("pending-{}", self.0.simple())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-flight optimistic records keyed by correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLedger<T> {
    ops: HashMap<CorrelationId, T>,
    /// Insertion order, for stable iteration.
    order: Vec<CorrelationId>,
}

impl<T> Default for PendingLedger<T> {
    fn default() -> Self {
        Self {
            ops: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> PendingLedger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a temporary record under `op`.
    pub fn begin(&mut self, op: CorrelationId, temp: T) {
        if self.ops.insert(op, temp).is_none() {
            self.order.push(op);
        }
    }

    /// Removes and returns the temporary record of `op`.
    pub fn settle(&mut self, op: CorrelationId) -> Option<T> {
        let temp = self.ops.remove(&op)?;
        self.order.retain(|o| *o != op);
        Some(temp)
    }

    /// Whether `op` is still in flight.
    pub fn contains(&self, op: CorrelationId) -> bool {
        self.ops.contains_key(&op)
    }

    pub fn get(&self, op: CorrelationId) -> Option<&T> {
        self.ops.get(&op)
    }

    /// Temporary records in begin order.
    pub fn iter(&self) -> impl Iterator<Item = (CorrelationId, &T)> {
        self.order.iter().filter_map(|op| self.ops.get(op).map(|t| (*op, t)))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_settle() {
        let mut ledger = PendingLedger::new();
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        ledger.begin(a, "a");
        ledger.begin(b, "b");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.iter().map(|(_, t)| *t).collect::<Vec<_>>(), vec!["a", "b"]);

        assert_eq!(ledger.settle(a), Some("a"));
        assert!(!ledger.contains(a));
        assert_eq!(ledger.settle(a), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_temp_ids_are_distinct() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a.temp_record_id(), b.temp_record_id());
        assert!(a.temp_record_id().starts_with("pending-"));
    }
}
