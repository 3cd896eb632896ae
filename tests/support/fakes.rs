// ABOUTME: In-memory fake providers recording every call for assertions.
// ABOUTME: Configurable failure and poll behavior per test.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use gantry::build::{BuildInstructions, SchedulerJobSpec, ServiceSpec};
use gantry::provider::{
    BuildOps, BuildSubmission, CloudError, Commit, IamOps, IamPolicy, ImageArtifact, LogEntry,
    LogOps, LogQuery, OperationOps, RemoteOperation, SchedulerOps, SecretOps, ServiceLocation,
    ServiceOps, ServiceRevision, SourceError, SourceOps, authenticated_clone_url,
};

#[derive(Default)]
pub struct CloudState {
    pub submitted: Vec<BuildInstructions>,
    /// Polls that report in-progress before the operation completes.
    pub polls_until_done: usize,
    pub polls: usize,
    /// When set, the build operation completes with this error.
    pub build_error: Option<String>,
    pub digest: String,
    /// Transient submit failures to serve before accepting a build.
    pub submit_failures_remaining: usize,
    /// Generic long-running operations, keyed by name. Unknown names read as
    /// already done.
    pub operations: HashMap<String, RemoteOperation>,
    pub created: Vec<ServiceSpec>,
    pub replaced: Vec<ServiceSpec>,
    pub policies: HashMap<String, IamPolicy>,
    pub policy_writes: usize,
    pub scheduler_jobs: Vec<SchedulerJobSpec>,
    pub secrets: Vec<(String, String)>,
    pub log_entries: Vec<LogEntry>,
    pub log_queries: Vec<LogQuery>,
}

/// Fake cloud provider. Implements every capability trait, so it satisfies
/// the full facade through the blanket impl.
pub struct FakeCloud {
    pub state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState {
                digest: "sha256:deadbeef".to_string(),
                ..CloudState::default()
            }),
        }
    }

    /// Builds complete only after `polls` in-progress responses.
    pub fn slow_build(polls: usize) -> Self {
        let fake = Self::new();
        fake.state.lock().polls_until_done = polls;
        fake
    }

    /// The build operation completes with a remote error.
    pub fn failing_build(error: &str) -> Self {
        let fake = Self::new();
        fake.state.lock().build_error = Some(error.to_string());
        fake
    }

    /// The first `failures` submit calls fail transiently, then succeed.
    pub fn flaky_submit(failures: usize) -> Self {
        let fake = Self::new();
        fake.state.lock().submit_failures_remaining = failures;
        fake
    }

    fn revision_for(name: &str) -> ServiceRevision {
        ServiceRevision {
            name: name.to_string(),
            url: format!("https://{name}-abc123.a.run.app"),
        }
    }
}

#[async_trait]
impl BuildOps for FakeCloud {
    async fn submit_build(
        &self,
        instructions: &BuildInstructions,
    ) -> Result<BuildSubmission, CloudError> {
        let mut state = self.state.lock();
        if state.submit_failures_remaining > 0 {
            state.submit_failures_remaining -= 1;
            return Err(CloudError::Transient("503 service unavailable".to_string()));
        }
        state.submitted.push(instructions.clone());
        Ok(BuildSubmission {
            operation_name: format!("operations/build-{}", state.submitted.len()),
        })
    }

    async fn get_build_operation(
        &self,
        _operation_name: &str,
    ) -> Result<RemoteOperation, CloudError> {
        let mut state = self.state.lock();
        if state.polls < state.polls_until_done {
            state.polls += 1;
            return Ok(RemoteOperation::default());
        }
        if let Some(error) = state.build_error.clone() {
            return Ok(RemoteOperation {
                done: true,
                images: Vec::new(),
                error: Some(error),
            });
        }

        let image = state
            .submitted
            .last()
            .and_then(|i| i.images.first())
            .cloned()
            .unwrap_or_else(|| "gcr.io/acme-123/shop-production".to_string());
        Ok(RemoteOperation {
            done: true,
            images: vec![ImageArtifact {
                name: image,
                digest: state.digest.clone(),
            }],
            error: None,
        })
    }
}

#[async_trait]
impl OperationOps for FakeCloud {
    async fn get_operation(&self, operation_name: &str) -> Result<RemoteOperation, CloudError> {
        let state = self.state.lock();
        Ok(state
            .operations
            .get(operation_name)
            .cloned()
            .unwrap_or(RemoteOperation {
                done: true,
                images: Vec::new(),
                error: None,
            }))
    }
}

#[async_trait]
impl ServiceOps for FakeCloud {
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceRevision, CloudError> {
        let mut state = self.state.lock();
        state.created.push(spec.clone());
        Ok(Self::revision_for(&spec.name))
    }

    async fn replace_service(&self, spec: &ServiceSpec) -> Result<ServiceRevision, CloudError> {
        let mut state = self.state.lock();
        state.replaced.push(spec.clone());
        Ok(Self::revision_for(&spec.name))
    }

    async fn get_service(
        &self,
        name: &str,
        _region: &str,
    ) -> Result<ServiceRevision, CloudError> {
        Ok(Self::revision_for(name))
    }
}

#[async_trait]
impl IamOps for FakeCloud {
    async fn get_iam_policy(&self, service: &ServiceLocation) -> Result<IamPolicy, CloudError> {
        let state = self.state.lock();
        Ok(state
            .policies
            .get(&service.service)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_iam_policy(
        &self,
        service: &ServiceLocation,
        policy: &IamPolicy,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        state.policies.insert(service.service.clone(), policy.clone());
        state.policy_writes += 1;
        Ok(())
    }
}

#[async_trait]
impl SecretOps for FakeCloud {
    async fn set_secret(&self, key: &str, value: &str) -> Result<(), CloudError> {
        self.state
            .lock()
            .secrets
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}

#[async_trait]
impl SchedulerOps for FakeCloud {
    async fn create_scheduler_job(&self, spec: &SchedulerJobSpec) -> Result<(), CloudError> {
        self.state.lock().scheduler_jobs.push(spec.clone());
        Ok(())
    }
}

#[async_trait]
impl LogOps for FakeCloud {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, CloudError> {
        let mut state = self.state.lock();
        state.log_queries.push(query.clone());
        Ok(state.log_entries.clone())
    }
}

#[derive(Default)]
pub struct SourceState {
    pub head_sha: String,
    pub head_message: String,
    pub checks_pass: bool,
    /// Transient failures to serve before resolving a commit.
    pub failures_remaining: usize,
    /// How many times a branch HEAD has been resolved.
    pub head_lookups: usize,
}

/// Fake source-control provider.
pub struct FakeSource {
    pub state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SourceState {
                head_sha: "abc123".to_string(),
                head_message: "Ship it".to_string(),
                checks_pass: true,
                failures_remaining: 0,
                head_lookups: 0,
            }),
        }
    }

    pub fn with_failing_checks() -> Self {
        let fake = Self::new();
        fake.state.lock().checks_pass = false;
        fake
    }
}

#[async_trait]
impl SourceOps for FakeSource {
    async fn latest_commit_for(
        &self,
        _repository: &str,
        _branch: &str,
    ) -> Result<Commit, SourceError> {
        let mut state = self.state.lock();
        state.head_lookups += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SourceError::Unavailable("timed out".to_string()));
        }
        Ok(Commit {
            sha: state.head_sha.clone(),
            message: state.head_message.clone(),
        })
    }

    async fn message_for_hash(
        &self,
        _repository: &str,
        hash: &str,
    ) -> Result<String, SourceError> {
        let state = self.state.lock();
        if hash == state.head_sha {
            Ok(state.head_message.clone())
        } else {
            Err(SourceError::CommitNotFound(hash.to_string()))
        }
    }

    async fn clone_url(&self, repository: &str) -> Result<String, SourceError> {
        Ok(authenticated_clone_url("github.com", repository, "test-token"))
    }

    async fn commit_checks_successful(
        &self,
        _repository: &str,
        _hash: &str,
    ) -> Result<bool, SourceError> {
        Ok(self.state.lock().checks_pass)
    }
}
