//! Lesson scheduling engine for school timetables.
//!
//! Keeps a yearly lesson catalog and the weekly lesson grid in step:
//! catalog entries are placed on a recurring weekly template, empty weeks
//! are generated in bulk, topic runs are kept contiguous, and lessons of
//! several subjects can be merged into one block and split again.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `YearlyLesson`, `WeeklyLesson`,
//!   `ScheduleTemplate`, `TimetableSettings`, `AllerleiGroup`, `Subject`
//! - **`store`**: Typed collection repositories, filters and the in-memory backend
//! - **`scheduler`**: Slot allocator, lesson synchronizer, batch generator
//! - **`planning`**: Gap filling, merged lessons, topic and double-lesson events
//! - **`state`**: Planner state mirror, pending-operation ledger, change hooks
//! - **`validation`**: Catalog, grid and merge-selection integrity checks
//! - **`config`**: Engine configuration (TOML)
//!
//! # Architecture
//!
//! The engine owns no persistence. Every mutation is an awaited call on a
//! [`store::Repository`]; the template and settings are read-only inputs.
//! Failures that a user can fix abort before any write
//! ([`PlanningError::Validation`]); everything else degrades, is logged
//! through the `log` facade and is reported in the operation's result.

pub mod config;
pub mod error;
pub mod models;
pub mod planning;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod validation;

pub use config::{EngineConfig, ScheduleMode};
pub use error::{OperationFailure, PlanningError, PlanningResult, ResolutionIssue};
