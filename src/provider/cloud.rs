// ABOUTME: Capability traits the pipeline requires from the cloud provider.
// ABOUTME: Build, service, IAM, secret, scheduler, and log operations behind async traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::{BuildInstructions, SchedulerJobSpec, ServiceSpec};
use crate::types::{BuiltImage, ParseBuiltImageError};

/// Errors from remote provider calls, classified for retry policy: transient
/// failures surface to the queue's retry mechanism, everything else fails the
/// step terminally.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Network trouble or a 5xx from the provider. Safe to retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The provider rejected the request (4xx, bad config). Retrying the
    /// same request cannot help.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The provider answered but the payload was not usable.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl CloudError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Transient(_))
    }
}

/// Handle returned when a build is submitted; polled until done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSubmission {
    pub operation_name: String,
}

/// An image artifact listed in a completed build's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub name: String,
    pub digest: String,
}

impl ImageArtifact {
    pub fn to_built_image(&self) -> Result<BuiltImage, ParseBuiltImageError> {
        BuiltImage::new(&self.name, &self.digest)
    }
}

/// State of a long-running remote operation. Build operations and
/// API-enablement operations share this shape; the former are polled through
/// [`BuildOps::get_build_operation`], everything else through
/// [`OperationOps::get_operation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub done: bool,
    /// Populated only for completed build operations.
    #[serde(default)]
    pub images: Vec<ImageArtifact>,
    /// Set when the operation completed unsuccessfully.
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteOperation {
    /// "Not done" means retry later; the surrounding queue owns the backoff.
    pub fn is_in_progress(&self) -> bool {
        !self.done
    }
}

/// A created or replaced service revision, as reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRevision {
    pub name: String,
    pub url: String,
}

/// Addresses one runtime service for IAM calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocation {
    pub cloud_project_id: String,
    pub region: String,
    pub service: String,
}

/// An IAM policy document for a runtime service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamBinding {
    pub role: String,
    pub members: Vec<String>,
}

/// Which service logs to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogKind {
    #[default]
    All,
    Application,
    Request,
}

#[derive(Debug, Clone)]
pub struct LogQuery {
    pub cloud_project_id: String,
    pub service_name: String,
    pub region: String,
    pub kind: LogKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub message: String,
}

/// Submit container builds and poll their operations.
#[async_trait]
pub trait BuildOps: Send + Sync {
    /// Hand a build to the remote build service; returns the operation handle
    /// used for polling.
    async fn submit_build(&self, instructions: &BuildInstructions)
    -> Result<BuildSubmission, CloudError>;

    async fn get_build_operation(&self, operation_name: &str)
    -> Result<RemoteOperation, CloudError>;
}

/// Poll generic long-running operations by name. API enablement during
/// environment provisioning is the main user; any operation sharing the
/// `{done, error}` shape can be watched through this.
#[async_trait]
pub trait OperationOps: Send + Sync {
    async fn get_operation(&self, operation_name: &str) -> Result<RemoteOperation, CloudError>;
}

/// Create, replace, and inspect runtime service revisions.
#[async_trait]
pub trait ServiceOps: Send + Sync {
    /// First revision of a service. Fails if the service already exists.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceRevision, CloudError>;

    /// Roll the existing service to a new revision.
    async fn replace_service(&self, spec: &ServiceSpec) -> Result<ServiceRevision, CloudError>;

    async fn get_service(&self, name: &str, region: &str)
    -> Result<ServiceRevision, CloudError>;
}

/// Read and write a service's IAM policy.
#[async_trait]
pub trait IamOps: Send + Sync {
    async fn get_iam_policy(&self, service: &ServiceLocation) -> Result<IamPolicy, CloudError>;

    async fn set_iam_policy(
        &self,
        service: &ServiceLocation,
        policy: &IamPolicy,
    ) -> Result<(), CloudError>;
}

/// Store secret material with the provider's secret manager.
#[async_trait]
pub trait SecretOps: Send + Sync {
    async fn set_secret(&self, key: &str, value: &str) -> Result<(), CloudError>;
}

/// Register scheduled jobs (the periodic tick hitting the service).
#[async_trait]
pub trait SchedulerOps: Send + Sync {
    async fn create_scheduler_job(&self, spec: &SchedulerJobSpec) -> Result<(), CloudError>;
}

/// Fetch service logs.
#[async_trait]
pub trait LogOps: Send + Sync {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, CloudError>;
}

/// The full facade the pipeline drives. Blanket-implemented for anything that
/// provides every capability.
pub trait CloudOps:
    BuildOps + OperationOps + ServiceOps + IamOps + SecretOps + SchedulerOps + LogOps
{
}

impl<T> CloudOps for T where
    T: BuildOps + OperationOps + ServiceOps + IamOps + SecretOps + SchedulerOps + LogOps
{
}
