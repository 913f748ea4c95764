//! Catalog planning services.
//!
//! - **Gap filling** (`gaps`): keeps topic runs contiguous.
//! - **Merged lessons** (`allerlei`): merge several subjects' lessons into
//!   one visible block and dissolve it again.
//! - **Planning events** (`events`): topic assignment, double-lesson
//!   toggling and cascade deletion.

mod allerlei;
mod events;
mod gaps;

pub use allerlei::{
    AllerleiSelection, AllerleiService, IntegrateOutcome, IntegrateRequest, UnlinkOutcome,
    ALLERLEI_MARKER,
};
pub use events::{DoubleToggle, PlanningEvents, RemovalReport, TopicAssignment};
pub use gaps::{find_gaps, GapFillReport, GapFiller};
