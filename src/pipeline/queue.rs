// ABOUTME: Queue-driven chain execution: one task per chain, steps in order.
// ABOUTME: Bounded retry for transient errors; polls sleep instead of blocking.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::types::DeploymentId;

use super::runner::{StepProgress, StepRunner};

/// Retry policy for one chain. Budgets are per step and reset whenever the
/// chain advances to the next row.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Transient-error retries a step gets before it is failed.
    pub max_attempts: u32,
    /// Poll rounds a waiting step gets before it is failed.
    pub max_poll_attempts: u32,
    /// Delay before re-running a step after a transient error.
    pub retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_poll_attempts: 180,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// How a chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainResult {
    Succeeded,
    Failed,
    /// The deployment was already terminal when the chain ran; nothing to do.
    Halted,
}

/// Dispatches deployment chains onto the async runtime. Steps within one
/// chain run strictly in order; chains for different deployments run
/// concurrently as independent tasks.
pub struct ChainDispatcher {
    runner: Arc<StepRunner>,
    config: QueueConfig,
}

impl ChainDispatcher {
    pub fn new(runner: Arc<StepRunner>, config: QueueConfig) -> Self {
        Self { runner, config }
    }

    /// Spawn the chain as a background task and hand back its handle.
    pub fn dispatch(&self, deployment_id: DeploymentId) -> JoinHandle<ChainResult> {
        let runner = Arc::clone(&self.runner);
        let config = self.config.clone();
        tokio::spawn(async move { run_chain(runner, config, deployment_id).await })
    }
}

/// Drive one deployment's chain from its first unfinished row to the end.
pub async fn run_chain(
    runner: Arc<StepRunner>,
    config: QueueConfig,
    deployment_id: DeploymentId,
) -> ChainResult {
    let mut index = 0usize;
    let mut attempts = 0u32;
    let mut polls = 0u32;

    loop {
        match runner.run_step(&deployment_id, index).await {
            Ok(StepProgress::Advanced { next: Some(next) }) => {
                index = next;
                attempts = 0;
                polls = 0;
            }
            Ok(StepProgress::Advanced { next: None }) => return ChainResult::Succeeded,
            Ok(StepProgress::Retry { after }) => {
                polls += 1;
                if polls > config.max_poll_attempts {
                    warn!(deployment = %deployment_id, index, "poll budget exhausted");
                    return fail(&runner, &deployment_id, index);
                }
                tokio::time::sleep(after).await;
            }
            Ok(StepProgress::Halted) => return ChainResult::Halted,
            Ok(StepProgress::Failed) => return ChainResult::Failed,
            Err(err) => {
                attempts += 1;
                if attempts >= config.max_attempts {
                    warn!(
                        deployment = %deployment_id,
                        index,
                        error = %err,
                        "retry budget exhausted"
                    );
                    return fail(&runner, &deployment_id, index);
                }
                warn!(deployment = %deployment_id, index, error = %err, "retrying step");
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }
}

fn fail(runner: &StepRunner, deployment_id: &DeploymentId, index: usize) -> ChainResult {
    if let Err(err) = runner.fail_step(deployment_id, index) {
        warn!(deployment = %deployment_id, index, error = %err, "could not record failure");
    }
    ChainResult::Failed
}
