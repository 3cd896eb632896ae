// ABOUTME: Configuration builders for remote resources.
// ABOUTME: Build instructions, service revision specs, scheduler jobs, IAM policy.

mod build_config;
mod iam;
mod scheduler_config;
mod service_config;

pub use build_config::{
    BuildConfig, BuildConfigError, BuildInstructions, BuildStep, SourceKind, StorageSource,
    image_location_for,
};
pub use iam::{ALL_USERS, INVOKER_ROLE, ensure_public_invoker, service_location};
pub use scheduler_config::{SchedulerConfigError, SchedulerJobSpec};
pub use service_config::{
    EnvVarPair, ServiceConfigError, ServiceSpec, resolved_env_vars,
};
