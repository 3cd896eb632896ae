// ABOUTME: The deployment pipeline: scenarios, steps, the runner, and the queue.
// ABOUTME: Chains are planned once, persisted as ledger rows, then executed.

mod queue;
mod runner;
mod scenario;
mod step;

pub use queue::{ChainDispatcher, ChainResult, QueueConfig, run_chain};
pub use runner::{PlatformSettings, StepProgress, StepRunner};
pub use scenario::Scenario;
pub use step::{StepError, StepKind, StepOutcome};
