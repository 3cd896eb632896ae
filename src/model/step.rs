// ABOUTME: Deployment step ledger row: one stage of a deployment's chain.
// ABOUTME: Mirrors the parent deployment's state machine at stage granularity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DeploymentId, StepId};

/// Stage-level status: `Pending → Started → {Finished | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Started,
    Finished,
    Failed,
}

/// One row in a deployment's step ledger. Rows are created up front when the
/// chain is planned (one per stage, in chain order), mutated in place as the
/// stage executes, and never deleted. `started_at`/`finished_at` are what a
/// restarted worker consults to decide whether a stage already ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub id: StepId,
    pub deployment_id: DeploymentId,
    /// Human-readable name of the pipeline stage.
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentStep {
    pub fn new(id: StepId, deployment_id: DeploymentId, name: impl Into<String>) -> Self {
        Self {
            id,
            deployment_id,
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the step started. Idempotent: `started_at` is set at most once,
    /// so a requeued or resumed step never double-starts.
    pub fn mark_as_started(&mut self) {
        if !self.has_started() {
            self.status = StepStatus::Started;
            self.started_at = Some(Utc::now());
        }
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn mark_as_finished(&mut self) {
        self.status = StepStatus::Finished;
        self.finished_at = Some(Utc::now());
    }

    /// Whether the step reached a terminal status (finished or failed).
    pub fn has_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn mark_as_failed(&mut self) {
        self.status = StepStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Elapsed time for the stage: terminal timestamp minus start, or
    /// now-based while still running. None if the stage never started.
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        Some(self.finished_at.unwrap_or_else(Utc::now) - started)
    }
}
