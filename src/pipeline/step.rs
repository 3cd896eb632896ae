// ABOUTME: The closed set of pipeline step kinds and their outcomes.
// ABOUTME: Step errors are classified transient vs terminal for the queue.

use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildConfigError, SchedulerConfigError, ServiceConfigError};
use crate::model::DeploymentStateError;
use crate::provider::{CloudError, SourceError};
use crate::store::StoreError;
use crate::types::ParseBuiltImageError;

/// Every stage the pipeline can execute. A scenario's plan is an ordered list
/// of these; each maps to exactly one ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Build the instructions and hand them to the remote build service.
    SubmitBuild,
    /// Poll the build operation; records the built image when it completes.
    WaitForBuild,
    /// First revision of the runtime service.
    CreateService,
    /// Roll an existing service to a new revision.
    ReplaceService,
    /// Instant redeploy: replace if the environment has a live service,
    /// otherwise create.
    CreateOrReplaceService,
    /// Read the created service's url back onto the environment (write-once).
    MarkUrls,
    /// Grant public invoke on the service if not already granted.
    EnsurePublicInvoke,
    /// Register the every-minute scheduler tick against the service url.
    StartScheduler,
}

impl StepKind {
    /// Human-readable stage name stored on the ledger row.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::SubmitBuild => "Submit build",
            StepKind::WaitForBuild => "Wait for build to finish",
            StepKind::CreateService => "Create service",
            StepKind::ReplaceService => "Deploy new revision",
            StepKind::CreateOrReplaceService => "Deploy existing image",
            StepKind::MarkUrls => "Record service URLs",
            StepKind::EnsurePublicInvoke => "Make service public",
            StepKind::StartScheduler => "Start scheduler",
        }
    }

    /// Inverse of [`label`](Self::label), used when resuming a chain from its
    /// persisted ledger rows.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Submit build" => Some(StepKind::SubmitBuild),
            "Wait for build to finish" => Some(StepKind::WaitForBuild),
            "Create service" => Some(StepKind::CreateService),
            "Deploy new revision" => Some(StepKind::ReplaceService),
            "Deploy existing image" => Some(StepKind::CreateOrReplaceService),
            "Record service URLs" => Some(StepKind::MarkUrls),
            "Make service public" => Some(StepKind::EnsurePublicInvoke),
            "Start scheduler" => Some(StepKind::StartScheduler),
            _ => None,
        }
    }
}

/// What a step's work unit reports back to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Not done yet; requeue the same step after the delay. Used by polling
    /// steps instead of blocking a worker.
    Retry { after: Duration },
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    BuildConfig(#[from] BuildConfigError),

    #[error(transparent)]
    ServiceConfig(#[from] ServiceConfigError),

    #[error(transparent)]
    SchedulerConfig(#[from] SchedulerConfigError),

    #[error(transparent)]
    State(#[from] DeploymentStateError),

    #[error("build completed but produced no usable image: {0}")]
    BuildProducedNoImage(String),

    #[error(transparent)]
    BadImage(#[from] ParseBuiltImageError),

    #[error("build failed remotely: {0}")]
    BuildFailed(String),

    #[error("deployment has no build operation to poll")]
    MissingOperation,

    #[error("ledger row names an unknown step: {0}")]
    UnknownStep(String),

    #[error("chain has no step at index {0}")]
    StepIndexOutOfRange(usize),

    #[error(transparent)]
    Slug(#[from] crate::types::SlugError),
}

impl StepError {
    /// Transient errors surface to the queue's bounded retry; everything
    /// else fails the step terminally.
    pub fn is_transient(&self) -> bool {
        match self {
            StepError::Cloud(e) => e.is_transient(),
            StepError::Source(SourceError::Unavailable(_)) => true,
            _ => false,
        }
    }
}
