//! Batch generation progress events.

use tokio::sync::mpsc;

/// A discrete progress event emitted during batch generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationProgress {
    /// A week was planned (or skipped).
    Planned { week_number: u32, weeks_done: u32, weeks_total: u32 },
    /// A create batch completed.
    Created { done: usize, total: usize },
    /// Generation is over.
    Finished { created: usize, failed: usize },
}

impl GenerationProgress {
    /// Overall completion in percent. Planning counts for the first 20%.
    pub fn percent(&self) -> u8 {
        match *self {
            Self::Planned {
                weeks_done,
                weeks_total,
                ..
            } => scaled(weeks_done as usize, weeks_total as usize, 0, 20),
            Self::Created { done, total } => scaled(done, total, 20, 100),
            Self::Finished { .. } => 100,
        }
    }
}

fn scaled(done: usize, total: usize, from: u8, to: u8) -> u8 {
    if total == 0 {
        return to;
    }
    let span = usize::from(to - from);
    from + (span * done.min(total) / total) as u8
}

/// Sending half of a progress channel.
pub type ProgressSender = mpsc::UnboundedSender<GenerationProgress>;

/// Creates a progress channel.
pub fn progress_channel() -> (ProgressSender, mpsc::UnboundedReceiver<GenerationProgress>) {
    mpsc::unbounded_channel()
}
