//! The push workflow: state machine, conflict recovery and the driver.

pub mod conflict;
mod orchestrator;
pub mod state;

pub use conflict::{
    AlwaysForce, AttemptResult, ConflictResolver, ForceConfirmation, NeverForce, Resolution,
    Strategy, StrategyAttempt,
};
pub use orchestrator::{Orchestrator, PushRequest, WorkflowOptions, WorkflowReport};
pub use state::{PushVia, StageMode, WorkflowState};
