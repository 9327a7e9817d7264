pub mod engine;
pub mod manager;
pub mod pacing;
pub mod session;
pub mod task;

#[cfg(test)]
mod testing;

pub use engine::ItemIterationEngine;
pub use manager::{RunController, RunError, RunSettings};
pub use pacing::{DelayKind, DelayPolicy, PacingPolicy, Sleeper, TokioSleeper};
pub use session::SessionManager;
pub use task::{
    ItemFailure, ItemOutcome, IterationOutcome, RunOutcome, RunSummary, SessionOutcome,
    SessionPhase, SessionReport, SessionState, UnfinishedReason,
};
