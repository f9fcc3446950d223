//! Clone workflow: stages, failure policies and confirmation

mod confirm;
mod orchestrator;
mod stage;

pub use confirm::{AutoApprove, Confirm, Decision, InteractiveConfirm};
pub use orchestrator::Orchestrator;
pub use stage::{BootstrapDecision, FailurePolicy, RestoreTarget, Stage, StageReport};
