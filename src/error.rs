// ABOUTME: Crate-wide error type aggregating the per-concern errors.
// ABOUTME: Orchestrator entry points return this; steps keep their own enums.

use thiserror::Error;

use crate::build::{BuildConfigError, SchedulerConfigError, ServiceConfigError};
use crate::model::DeploymentStateError;
use crate::pipeline::StepError;
use crate::provider::{CloudError, SourceError};
use crate::store::StoreError;
use crate::types::SlugError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    State(#[from] DeploymentStateError),

    #[error(transparent)]
    Slug(#[from] SlugError),

    #[error(transparent)]
    BuildConfig(#[from] BuildConfigError),

    #[error(transparent)]
    ServiceConfig(#[from] ServiceConfigError),

    #[error(transparent)]
    SchedulerConfig(#[from] SchedulerConfigError),

    #[error(transparent)]
    Step(#[from] StepError),
}

pub type Result<T> = std::result::Result<T, Error>;
