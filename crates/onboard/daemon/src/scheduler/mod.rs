//! Onboarding scheduler: candidate selection, the per-record state machine,
//! the batch orchestrator and the periodic tick loop

mod machine;
mod orchestrator;
mod selector;
mod ticker;

pub use machine::{OnboardingMachine, RecordOutcome};
pub use orchestrator::{Orchestrator, TickReport};
pub use selector::CandidateSelector;
pub use ticker::Scheduler;
