// ABOUTME: Deployment orchestration pipeline for container platforms.
// ABOUTME: Plans, records, and executes build-and-release chains per environment.

//! Gantry turns "deploy this commit to that environment" into a durable,
//! resumable chain of steps: build the image remotely, roll the runtime
//! service, and wire up urls, public access, and the scheduler. Chain state
//! lives in the record store, one ledger row per step, so progress survives
//! the process and a chain can resume where it left off.
//!
//! The cloud and source providers are capability traits; transports live
//! outside this crate.

pub mod build;
pub mod env_vars;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use orchestrator::{HookOutcome, HookPush, Orchestrator, StartedDeploy};
