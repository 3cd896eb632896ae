// ABOUTME: Collaborator interfaces: cloud provider facade and source provider.
// ABOUTME: The pipeline drives these traits; transports live outside the crate.

mod cloud;
mod source;

pub use cloud::{
    BuildOps, BuildSubmission, CloudError, CloudOps, IamBinding, IamOps, IamPolicy, ImageArtifact,
    LogEntry, LogKind, LogOps, LogQuery, OperationOps, RemoteOperation, SchedulerOps, SecretOps,
    ServiceLocation, ServiceOps, ServiceRevision,
};
pub use source::{Commit, SourceError, SourceOps, authenticated_clone_url};
