// ABOUTME: Persisted records for the deployment pipeline.
// ABOUTME: Projects, environments, deployments, and the step ledger.

mod deployment;
mod environment;
mod project;
mod step;

pub use deployment::{
    ANONYMOUS_INITIATOR, Deployment, DeploymentStateError, DeploymentStatus, SourceArchive,
};
pub use environment::{DatabaseBinding, Environment, EnvironmentOptions};
pub use project::{Project, ProjectType};
pub use step::{DeploymentStep, StepStatus};
