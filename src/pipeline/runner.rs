// ABOUTME: Executes pipeline steps one ledger row at a time.
// ABOUTME: All state lives in the store, so a chain can resume after a crash.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::build::{
    BuildConfig, BuildConfigError, SchedulerJobSpec, ServiceSpec, SourceKind,
    ensure_public_invoker, service_location,
};
use crate::model::{Deployment, Environment};
use crate::provider::{CloudOps, SourceOps};
use crate::store::Store;
use crate::types::DeploymentId;

use super::step::{StepError, StepKind, StepOutcome};

/// Platform-level knobs threaded into step execution.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    /// Base URL the templated build instructions are fetched from.
    pub instructions_base_url: String,
    /// Delay between polls of an in-progress build operation.
    pub build_poll_interval: Duration,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            instructions_base_url: "https://gantry.dev".to_string(),
            build_poll_interval: Duration::from_secs(10),
        }
    }
}

/// What running one ledger row accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepProgress {
    /// The row finished (now or previously); `next` is the index of the
    /// following row, or `None` when the chain is complete.
    Advanced { next: Option<usize> },
    /// The row is waiting on a remote operation; run it again after the delay.
    Retry { after: Duration },
    /// The deployment is already terminal; nothing was run.
    Halted,
    /// The row hit a terminal error. The step and the deployment are marked
    /// failed; later rows must never run.
    Failed,
}

/// Runs individual steps of a deployment chain. Stateless between calls:
/// everything it needs is reloaded from the store, so the queue can hand the
/// same runner interleaved work from many chains.
pub struct StepRunner {
    store: Arc<Store>,
    cloud: Arc<dyn CloudOps>,
    source: Arc<dyn SourceOps>,
    settings: PlatformSettings,
}

impl StepRunner {
    pub fn new(
        store: Arc<Store>,
        cloud: Arc<dyn CloudOps>,
        source: Arc<dyn SourceOps>,
        settings: PlatformSettings,
    ) -> Self {
        Self {
            store,
            cloud,
            source,
            settings,
        }
    }

    /// Run the chain's step at `index` for this deployment.
    ///
    /// Transient errors (provider 5xx, source outage) are returned as `Err`
    /// so the queue can apply its bounded retry; every terminal error is
    /// absorbed here by failing the step and the deployment.
    pub async fn run_step(
        &self,
        deployment_id: &DeploymentId,
        index: usize,
    ) -> Result<StepProgress, StepError> {
        let deployment = self.store.deployment(deployment_id)?;
        if deployment.status.is_terminal() {
            // A failed deployment never runs another step; a successful one
            // has nothing left to run.
            return Ok(StepProgress::Halted);
        }

        let rows = self.store.steps_for(deployment_id);
        let row = rows
            .get(index)
            .ok_or(StepError::StepIndexOutOfRange(index))?;
        let kind =
            StepKind::from_label(&row.name).ok_or_else(|| StepError::UnknownStep(row.name.clone()))?;
        let next = (index + 1 < rows.len()).then_some(index + 1);

        if row.has_finished() {
            // Already done in a previous life of this chain; skip forward.
            // A resumed chain whose rows all finished still needs finalizing.
            if next.is_none() {
                self.finalize(&deployment)?;
            }
            return Ok(StepProgress::Advanced { next });
        }

        self.store
            .update_deployment(deployment_id, |d| d.mark_as_in_progress())??;
        self.store.update_step(&row.id, |s| s.mark_as_started())?;
        info!(deployment = %deployment_id, step = %row.name, "running step");

        let environment = self.store.environment(&deployment.environment_id)?;
        match self.execute(kind, &deployment, &environment).await {
            Ok(StepOutcome::Done) => {
                self.store.update_step(&row.id, |s| s.mark_as_finished())?;
                if next.is_none() {
                    self.finalize(&deployment)?;
                }
                Ok(StepProgress::Advanced { next })
            }
            Ok(StepOutcome::Retry { after }) => Ok(StepProgress::Retry { after }),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                warn!(deployment = %deployment_id, step = %row.name, error = %err, "step failed");
                self.fail_step(deployment_id, index)?;
                Ok(StepProgress::Failed)
            }
        }
    }

    /// Mark a step and its deployment failed. Also called by the queue when a
    /// transient error exhausts its retry budget.
    pub fn fail_step(&self, deployment_id: &DeploymentId, index: usize) -> Result<(), StepError> {
        let rows = self.store.steps_for(deployment_id);
        let row = rows
            .get(index)
            .ok_or(StepError::StepIndexOutOfRange(index))?;
        self.store.update_step(&row.id, |s| s.mark_as_failed())?;
        self.store
            .update_deployment(deployment_id, |d| d.mark_as_failed())??;
        Ok(())
    }

    fn finalize(&self, deployment: &Deployment) -> Result<(), StepError> {
        self.store
            .update_deployment(&deployment.id, |d| d.mark_as_successful())??;
        self.store
            .set_active_deployment(&deployment.environment_id, &deployment.id)?;
        info!(deployment = %deployment.id, "deployment succeeded");
        Ok(())
    }

    async fn execute(
        &self,
        kind: StepKind,
        deployment: &Deployment,
        environment: &Environment,
    ) -> Result<StepOutcome, StepError> {
        match kind {
            StepKind::SubmitBuild => self.submit_build(deployment, environment).await,
            StepKind::WaitForBuild => self.wait_for_build(deployment).await,
            StepKind::CreateService => {
                let spec = ServiceSpec::for_deployment(deployment, environment)?;
                self.cloud.create_service(&spec).await?;
                Ok(StepOutcome::Done)
            }
            StepKind::ReplaceService => {
                let spec = ServiceSpec::for_deployment(deployment, environment)?;
                self.cloud.replace_service(&spec).await?;
                Ok(StepOutcome::Done)
            }
            StepKind::CreateOrReplaceService => {
                let spec = ServiceSpec::for_deployment(deployment, environment)?;
                if environment.has_been_deployed_successfully() {
                    self.cloud.replace_service(&spec).await?;
                } else {
                    self.cloud.create_service(&spec).await?;
                }
                Ok(StepOutcome::Done)
            }
            StepKind::MarkUrls => self.mark_urls(environment).await,
            StepKind::EnsurePublicInvoke => self.ensure_public_invoke(environment).await,
            StepKind::StartScheduler => {
                let spec = SchedulerJobSpec::for_environment(environment)?;
                self.cloud.create_scheduler_job(&spec).await?;
                Ok(StepOutcome::Done)
            }
        }
    }

    async fn submit_build(
        &self,
        deployment: &Deployment,
        environment: &Environment,
    ) -> Result<StepOutcome, StepError> {
        let source = self.build_source(deployment, environment).await?;
        let config = BuildConfig::new(
            deployment,
            environment,
            source,
            &self.settings.instructions_base_url,
        );
        let instructions = config.instructions()?;

        let submission = self.cloud.submit_build(&instructions).await?;
        self.store.update_deployment(&deployment.id, |d| {
            d.record_operation_name(&submission.operation_name)
        })?;
        Ok(StepOutcome::Done)
    }

    /// Pick where the build obtains sources: an uploaded archive wins, then a
    /// resolvable revision; a deployment with neither cannot be built.
    async fn build_source(
        &self,
        deployment: &Deployment,
        environment: &Environment,
    ) -> Result<SourceKind, StepError> {
        if let Some(archive) = &deployment.archive {
            return Ok(SourceKind::Manual {
                bucket: archive.bucket.clone(),
                object: archive.object.clone(),
            });
        }
        if deployment.commit_hash.is_empty() {
            return Err(BuildConfigError::MissingSource.into());
        }
        let clone_url = self
            .source
            .clone_url(&environment.project.repository)
            .await?;
        Ok(SourceKind::Revision { clone_url })
    }

    async fn wait_for_build(&self, deployment: &Deployment) -> Result<StepOutcome, StepError> {
        let operation_name = deployment
            .operation_name
            .clone()
            .ok_or(StepError::MissingOperation)?;

        let operation = self.cloud.get_build_operation(&operation_name).await?;
        if operation.is_in_progress() {
            return Ok(StepOutcome::Retry {
                after: self.settings.build_poll_interval,
            });
        }
        if let Some(error) = operation.error {
            return Err(StepError::BuildFailed(error));
        }

        let artifact = operation
            .images
            .first()
            .ok_or(StepError::BuildProducedNoImage(operation_name))?;
        let image = artifact.to_built_image()?;
        self.store
            .update_deployment(&deployment.id, |d| d.record_image(image))??;
        Ok(StepOutcome::Done)
    }

    /// Read the service's routable url back onto the environment. The write
    /// is once-only, and the first write also seeds APP_URL into the
    /// environment's variables so the next deploy ships it.
    async fn mark_urls(&self, environment: &Environment) -> Result<StepOutcome, StepError> {
        let slug = environment.slug()?;
        let revision = self
            .cloud
            .get_service(slug.as_str(), environment.region())
            .await?;

        self.store.update_environment(&environment.id, |env| {
            if env.set_url(&revision.url) {
                let mut vars = env.env_vars();
                vars.set("APP_URL", &revision.url);
                env.variables_blob = vars.to_blob();
            }
        })?;
        Ok(StepOutcome::Done)
    }

    async fn ensure_public_invoke(
        &self,
        environment: &Environment,
    ) -> Result<StepOutcome, StepError> {
        let location = service_location(environment)?;
        let mut policy = self.cloud.get_iam_policy(&location).await?;
        if ensure_public_invoker(&mut policy) {
            self.cloud.set_iam_policy(&location, &policy).await?;
        }
        Ok(StepOutcome::Done)
    }
}
