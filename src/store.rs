// ABOUTME: In-memory repository for environments, deployments, and step rows.
// ABOUTME: Read-modify-write under one lock; the persistence engine is out of scope.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Deployment, DeploymentStep, Environment, SourceArchive};
use crate::types::{BuiltImage, DeploymentId, EnvironmentId, StepId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("environment not found: {0}")]
    EnvironmentNotFound(EnvironmentId),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(DeploymentId),

    #[error("deployment step not found: {0}")]
    StepNotFound(StepId),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything the pipeline asks the store to remember about a new deployment.
#[derive(Debug, Clone, Default)]
pub struct NewDeployment {
    pub commit_hash: String,
    pub commit_message: String,
    pub initiator_id: Option<UserId>,
    /// Carried-over image for instant redeploys.
    pub image: Option<BuiltImage>,
    /// Uploaded archive for manual-push deploys.
    pub archive: Option<SourceArchive>,
}

#[derive(Default)]
struct Inner {
    environments: HashMap<EnvironmentId, Environment>,
    deployments: HashMap<DeploymentId, Deployment>,
    steps: HashMap<StepId, DeploymentStep>,
    /// Chain order of step rows per deployment. Append-only.
    step_order: HashMap<DeploymentId, Vec<StepId>>,
}

fn surrogate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// The record store the pipeline runs against.
///
/// Environment variable blobs follow last-writer-wins semantics: each update
/// closure runs under the write lock, but two logical read-modify-write calls
/// do not see each other's intermediate state and are not guaranteed to
/// commute. Deployment and step rows are only ever mutated by the single
/// chain that owns them, so there is no cross-chain contention on those.
#[derive(Default)]
pub struct Store {
    inner: RwLock<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- environments ----------------------------------------------------

    /// Register an environment, returning its id for convenience.
    pub fn insert_environment(&self, environment: Environment) -> EnvironmentId {
        let mut inner = self.inner.write();
        let id = environment.id.clone();
        inner.environments.insert(id.clone(), environment);
        id
    }

    pub fn environment(&self, id: &EnvironmentId) -> Result<Environment> {
        self.inner
            .read()
            .environments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::EnvironmentNotFound(id.clone()))
    }

    /// Run a mutation against an environment under the write lock.
    pub fn update_environment<R>(
        &self,
        id: &EnvironmentId,
        f: impl FnOnce(&mut Environment) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.write();
        let environment = inner
            .environments
            .get_mut(id)
            .ok_or_else(|| StoreError::EnvironmentNotFound(id.clone()))?;
        Ok(f(environment))
    }

    /// Point the environment at its new active deployment. Done as a single
    /// locked mutation so a reader never sees a half-updated pair; called
    /// only when that deployment's chain has fully succeeded.
    pub fn set_active_deployment(
        &self,
        environment_id: &EnvironmentId,
        deployment_id: &DeploymentId,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.deployments.contains_key(deployment_id) {
            return Err(StoreError::DeploymentNotFound(deployment_id.clone()));
        }
        let environment = inner
            .environments
            .get_mut(environment_id)
            .ok_or_else(|| StoreError::EnvironmentNotFound(environment_id.clone()))?;
        environment.active_deployment_id = Some(deployment_id.clone());
        Ok(())
    }

    // ---- deployments -----------------------------------------------------

    pub fn create_deployment(
        &self,
        environment_id: &EnvironmentId,
        new: NewDeployment,
    ) -> Result<Deployment> {
        let mut inner = self.inner.write();
        if !inner.environments.contains_key(environment_id) {
            return Err(StoreError::EnvironmentNotFound(environment_id.clone()));
        }

        let id = DeploymentId::new(surrogate_id("dep"));
        let mut deployment = Deployment::new(
            id.clone(),
            environment_id.clone(),
            new.commit_hash,
            new.commit_message,
            new.initiator_id,
        );
        if let Some(image) = new.image {
            deployment = deployment.with_image(image);
        }
        if let Some(archive) = new.archive {
            deployment = deployment.with_archive(archive);
        }

        inner.deployments.insert(id, deployment.clone());
        inner.step_order.entry(deployment.id.clone()).or_default();
        Ok(deployment)
    }

    pub fn deployment(&self, id: &DeploymentId) -> Result<Deployment> {
        self.inner
            .read()
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))
    }

    pub fn update_deployment<R>(
        &self,
        id: &DeploymentId,
        f: impl FnOnce(&mut Deployment) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.write();
        let deployment = inner
            .deployments
            .get_mut(id)
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))?;
        Ok(f(deployment))
    }

    /// Latest-first list of an environment's deployments (audit history).
    pub fn deployments_for(&self, environment_id: &EnvironmentId) -> Vec<Deployment> {
        let inner = self.inner.read();
        let mut deployments: Vec<Deployment> = inner
            .deployments
            .values()
            .filter(|d| d.environment_id == *environment_id)
            .cloned()
            .collect();
        deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deployments
    }

    // ---- step ledger -----------------------------------------------------

    /// Create the ledger rows for a planned chain, one per stage, in order.
    pub fn create_steps(
        &self,
        deployment_id: &DeploymentId,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Vec<DeploymentStep>> {
        let mut inner = self.inner.write();
        if !inner.deployments.contains_key(deployment_id) {
            return Err(StoreError::DeploymentNotFound(deployment_id.clone()));
        }

        let mut created = Vec::new();
        for name in names {
            let id = StepId::new(surrogate_id("step"));
            let step = DeploymentStep::new(id.clone(), deployment_id.clone(), name);
            inner.steps.insert(id.clone(), step.clone());
            inner
                .step_order
                .entry(deployment_id.clone())
                .or_default()
                .push(id);
            created.push(step);
        }
        Ok(created)
    }

    pub fn update_step<R>(
        &self,
        id: &StepId,
        f: impl FnOnce(&mut DeploymentStep) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.write();
        let step = inner
            .steps
            .get_mut(id)
            .ok_or_else(|| StoreError::StepNotFound(id.clone()))?;
        Ok(f(step))
    }

    /// A deployment's step rows in chain order.
    pub fn steps_for(&self, deployment_id: &DeploymentId) -> Vec<DeploymentStep> {
        let inner = self.inner.read();
        inner
            .step_order
            .get(deployment_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.steps.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
