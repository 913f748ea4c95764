//! Local planner state.
//!
//! The store is the source of truth; this module holds a best-effort
//! mirror of it for collaborators (UI, caches):
//!
//! - [`PlannerState`] with a pure [`reduce`] over [`Action`]s
//! - [`PendingLedger`] of optimistic creates keyed by [`CorrelationId`]
//! - [`RequestTracker`] for latest-request-wins staleness checks
//! - [`ChangeObserver`] hooks the scheduling services call after each
//!   mutation, and [`StateMirror`] which applies them to a shared state

mod ledger;
mod mirror;
mod observer;
mod reducer;
mod tracker;

pub use ledger::{CorrelationId, PendingLedger};
pub use mirror::StateMirror;
pub use observer::{ChangeObserver, NoopObserver};
pub use reducer::{reduce, Action, PlannerState};
pub use tracker::{RequestToken, RequestTracker};
