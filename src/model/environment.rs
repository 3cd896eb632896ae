// ABOUTME: Environment record: a named deploy target within a project.
// ABOUTME: Owns variables, options, urls, and the active-deployment pointer.

use serde::{Deserialize, Serialize};

use crate::env_vars::EnvVars;
use crate::types::{DeploymentId, EnvironmentId, Slug, SlugError};

use super::project::Project;

/// Tunable knobs for the runtime service, with platform defaults matching
/// what a fresh environment gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOptions {
    pub memory: String,
    pub cpu: u32,
    /// Maximum seconds a single request may take.
    pub request_timeout: u32,
    /// Requests one container instance may serve concurrently.
    pub max_requests_per_container: u32,
    pub max_instances: u32,
    /// When set, hook-triggered deploys wait for the commit's checks to pass.
    pub wait_for_checks: bool,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            memory: "1Gi".to_string(),
            cpu: 1,
            request_timeout: 300,
            max_requests_per_container: 80,
            max_instances: 1000,
            wait_for_checks: false,
        }
    }
}

/// Database credentials bound to an environment. Injected into Laravel
/// deployments as DB_* variables; the socket path follows the managed-SQL
/// proxy convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseBinding {
    pub name: String,
    pub username: String,
    pub password: String,
    /// "project:region:instance" connection string of the database instance.
    pub connection_string: String,
}

/// A named, independently configured deploy target ("production", "staging")
/// within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub project: Project,
    /// Branch tracked for HEAD deploys and hook-triggered deploys.
    pub branch: String,
    pub options: EnvironmentOptions,
    /// Canonical serialized variable blob. Only the environment writes this;
    /// deployments read a parsed copy and layer injected keys on top.
    pub variables_blob: String,
    /// Routable URL of the web service. Written once, by the first successful
    /// deploy's mark-urls step.
    pub url: Option<String>,
    /// Points at the most recent successful deployment. Updated only when a
    /// chain finishes successfully.
    pub active_deployment_id: Option<DeploymentId>,
    pub database: Option<DatabaseBinding>,
}

impl Environment {
    pub fn new(id: EnvironmentId, name: impl Into<String>, project: Project, branch: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            project,
            branch: branch.into(),
            options: EnvironmentOptions::default(),
            variables_blob: String::new(),
            url: None,
            active_deployment_id: None,
            database: None,
        }
    }

    /// The "{project}-{environment}" slug naming the service, queue, and
    /// image path. Pure function of the two names.
    pub fn slug(&self) -> Result<Slug, SlugError> {
        Slug::for_environment(&self.project.name, &self.name)
    }

    /// The queue name is the slug.
    pub fn queue_name(&self) -> Result<Slug, SlugError> {
        self.slug()
    }

    pub fn region(&self) -> &str {
        &self.project.region
    }

    pub fn cloud_project_id(&self) -> &str {
        &self.project.cloud_project_id
    }

    /// Whether this environment has been successfully deployed at least once.
    /// Drives initial-vs-redeploy chain planning.
    pub fn has_been_deployed_successfully(&self) -> bool {
        self.active_deployment_id.is_some()
    }

    /// Parsed copy of the stored variable blob.
    pub fn env_vars(&self) -> EnvVars {
        EnvVars::from_blob(&self.variables_blob)
    }

    pub fn has_env_var(&self, key: &str) -> bool {
        self.env_vars().has(key)
    }

    pub fn get_env_var(&self, key: &str) -> Option<String> {
        self.env_vars().get(key).map(str::to_string)
    }

    /// Record the web URL. Only the first write sticks; later calls are
    /// no-ops so redeploys never clobber it. Returns whether the write took.
    pub fn set_url(&mut self, url: impl Into<String>) -> bool {
        if self.url.is_some() {
            return false;
        }
        self.url = Some(url.into());
        true
    }
}
