// ABOUTME: Entry points for starting deployments and managing environments.
// ABOUTME: Picks a scenario, writes the ledger, and hands the chain to the queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Deployment, Environment, ProjectType, SourceArchive};
use crate::pipeline::{ChainDispatcher, ChainResult, PlatformSettings, QueueConfig, Scenario, StepRunner};
use crate::provider::{CloudOps, LogEntry, LogKind, LogQuery, SourceOps};
use crate::store::{NewDeployment, Store};
use crate::types::{DeploymentId, EnvironmentId, UserId};

/// A deployment that has been recorded and whose chain is running.
#[derive(Debug)]
pub struct StartedDeploy {
    pub deployment: Deployment,
    /// Await this to learn how the chain ended.
    pub chain: JoinHandle<ChainResult>,
}

/// A push event delivered by the source provider's hook.
#[derive(Debug, Clone)]
pub struct HookPush {
    pub repository: String,
    pub branch: String,
    pub commit_hash: String,
    pub commit_message: String,
    /// The platform user matching the pusher, when one exists.
    pub initiator: Option<UserId>,
}

/// What the hook handler decided to do with a push.
pub enum HookOutcome {
    /// Wrong repository or branch, or checks have not passed yet.
    Ignored,
    Started(StartedDeploy),
}

/// The front door of the pipeline. Every way a deployment can start funnels
/// through here so scenario selection happens in exactly one place.
pub struct Orchestrator {
    store: Arc<Store>,
    cloud: Arc<dyn CloudOps>,
    source: Arc<dyn SourceOps>,
    dispatcher: ChainDispatcher,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        cloud: Arc<dyn CloudOps>,
        source: Arc<dyn SourceOps>,
        settings: PlatformSettings,
        queue: QueueConfig,
    ) -> Self {
        let runner = Arc::new(StepRunner::new(
            Arc::clone(&store),
            Arc::clone(&cloud),
            Arc::clone(&source),
            settings,
        ));
        Self {
            store,
            cloud,
            source,
            dispatcher: ChainDispatcher::new(runner, queue),
        }
    }

    /// First-time setup of an environment: seed its framework variables, then
    /// run an initial deploy of the tracked branch's HEAD.
    pub async fn provision(
        &self,
        environment_id: &EnvironmentId,
        initiator: Option<UserId>,
    ) -> Result<StartedDeploy> {
        self.store
            .update_environment(environment_id, seed_initial_variables)?;
        self.deploy(environment_id, initiator).await
    }

    /// Deploy the HEAD of the environment's tracked branch.
    pub async fn deploy(
        &self,
        environment_id: &EnvironmentId,
        initiator: Option<UserId>,
    ) -> Result<StartedDeploy> {
        let environment = self.store.environment(environment_id)?;
        let commit = self
            .source
            .latest_commit_for(&environment.project.repository, &environment.branch)
            .await?;

        self.start(
            &environment,
            build_scenario(&environment),
            NewDeployment {
                commit_hash: commit.sha,
                commit_message: commit.message,
                initiator_id: initiator,
                ..NewDeployment::default()
            },
        )
    }

    /// Deploy a specific commit by hash.
    pub async fn deploy_hash(
        &self,
        environment_id: &EnvironmentId,
        hash: &str,
        initiator: Option<UserId>,
    ) -> Result<StartedDeploy> {
        let environment = self.store.environment(environment_id)?;
        let message = self
            .source
            .message_for_hash(&environment.project.repository, hash)
            .await?;

        self.start(
            &environment,
            build_scenario(&environment),
            NewDeployment {
                commit_hash: hash.to_string(),
                commit_message: message,
                initiator_id: initiator,
                ..NewDeployment::default()
            },
        )
    }

    /// Deploy from a manually uploaded source archive instead of a revision.
    pub fn deploy_upload(
        &self,
        environment_id: &EnvironmentId,
        archive: SourceArchive,
        initiator: Option<UserId>,
    ) -> Result<StartedDeploy> {
        let environment = self.store.environment(environment_id)?;
        self.start(
            &environment,
            build_scenario(&environment),
            NewDeployment {
                commit_message: "Manual upload".to_string(),
                initiator_id: initiator,
                archive: Some(archive),
                ..NewDeployment::default()
            },
        )
    }

    /// Deploy a previous deployment again. When the environment is live and
    /// the previous deployment kept its image, the image is reused and no
    /// build runs; otherwise the commit is rebuilt.
    pub fn redeploy(
        &self,
        deployment_id: &DeploymentId,
        initiator: Option<UserId>,
    ) -> Result<StartedDeploy> {
        let previous = self.store.deployment(deployment_id)?;
        let environment = self.store.environment(&previous.environment_id)?;

        let instant = environment.has_been_deployed_successfully() && previous.image.is_some();
        let scenario = if instant {
            Scenario::InstantRedeploy
        } else {
            build_scenario(&environment)
        };

        self.start(
            &environment,
            scenario,
            NewDeployment {
                commit_hash: previous.commit_hash,
                commit_message: previous.commit_message,
                initiator_id: initiator,
                image: instant.then_some(previous.image).flatten(),
                archive: previous.archive,
            },
        )
    }

    /// Handle a push event from the source provider's hook. Pushes to other
    /// repositories or branches are ignored, as are pushes whose checks have
    /// not passed when the environment waits for checks.
    pub async fn deploy_from_hook(
        &self,
        environment_id: &EnvironmentId,
        push: HookPush,
    ) -> Result<HookOutcome> {
        let environment = self.store.environment(environment_id)?;
        if push.repository != environment.project.repository || push.branch != environment.branch {
            info!(environment = %environment_id, branch = %push.branch, "ignoring push");
            return Ok(HookOutcome::Ignored);
        }

        if environment.options.wait_for_checks {
            let passed = self
                .source
                .commit_checks_successful(&push.repository, &push.commit_hash)
                .await?;
            if !passed {
                info!(environment = %environment_id, commit = %push.commit_hash, "checks not passed; ignoring push");
                return Ok(HookOutcome::Ignored);
            }
        }

        let started = self.start(
            &environment,
            build_scenario(&environment),
            NewDeployment {
                commit_hash: push.commit_hash,
                commit_message: push.commit_message,
                initiator_id: push.initiator,
                ..NewDeployment::default()
            },
        )?;
        Ok(HookOutcome::Started(started))
    }

    // ---- environment management -------------------------------------------

    /// Set one variable on the environment. Takes effect on the next deploy.
    pub fn add_env_var(
        &self,
        environment_id: &EnvironmentId,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.store.update_environment(environment_id, |env| {
            let mut vars = env.env_vars();
            vars.set(key, value);
            env.variables_blob = vars.to_blob();
        })?;
        Ok(())
    }

    pub fn has_env_var(&self, environment_id: &EnvironmentId, key: &str) -> Result<bool> {
        Ok(self.store.environment(environment_id)?.has_env_var(key))
    }

    pub fn get_env_var(
        &self,
        environment_id: &EnvironmentId,
        key: &str,
    ) -> Result<Option<String>> {
        Ok(self.store.environment(environment_id)?.get_env_var(key))
    }

    /// Store secret material with the provider's secret manager.
    pub async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.cloud.set_secret(key, value).await?;
        Ok(())
    }

    /// Fetch the environment's service logs.
    pub async fn logs(
        &self,
        environment_id: &EnvironmentId,
        kind: LogKind,
    ) -> Result<Vec<LogEntry>> {
        let environment = self.store.environment(environment_id)?;
        let query = LogQuery {
            cloud_project_id: environment.cloud_project_id().to_string(),
            service_name: environment.slug()?.to_string(),
            region: environment.region().to_string(),
            kind,
        };
        Ok(self.cloud.get_logs(&query).await?)
    }

    // ---- internals --------------------------------------------------------

    /// Record the deployment and its ledger rows, then dispatch the chain.
    fn start(
        &self,
        environment: &Environment,
        scenario: Scenario,
        new: NewDeployment,
    ) -> Result<StartedDeploy> {
        let deployment = self.store.create_deployment(&environment.id, new)?;
        let plan = scenario.plan();
        self.store
            .create_steps(&deployment.id, plan.iter().map(|kind| kind.label()))?;
        info!(
            deployment = %deployment.id,
            environment = %environment.id,
            ?scenario,
            steps = plan.len(),
            "deployment started"
        );

        let chain = self.dispatcher.dispatch(deployment.id.clone());
        Ok(StartedDeploy { deployment, chain })
    }
}

/// Build deploys pick their chain from deployment history: the first
/// successful deploy must create the service, every later one replaces it.
fn build_scenario(environment: &Environment) -> Scenario {
    if environment.has_been_deployed_successfully() {
        Scenario::Redeploy
    } else {
        Scenario::Initial
    }
}

/// Seed the framework variables a fresh environment needs, without clobbering
/// anything the user already set.
fn seed_initial_variables(environment: &mut Environment) {
    let name = environment.name.clone();
    let project_name = environment.project.name.clone();
    let mut vars = environment.env_vars();

    let defaults: Vec<(&str, String)> = match environment.project.project_type {
        ProjectType::Laravel => vec![
            ("APP_NAME", project_name),
            ("APP_ENV", name),
            ("APP_KEY", Uuid::new_v4().simple().to_string()),
        ],
        ProjectType::Rails => vec![
            ("RAILS_ENV", name),
            ("RAILS_SERVE_STATIC_FILES", "true".to_string()),
            ("RAILS_LOG_TO_STDOUT", "true".to_string()),
        ],
        ProjectType::NodeJs => vec![("NODE_ENV", name)],
    };

    for (key, value) in defaults {
        if !vars.has(key) {
            vars.set(key, value);
        }
    }
    environment.variables_blob = vars.to_blob();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;

    fn environment(project_type: ProjectType) -> Environment {
        Environment::new(
            EnvironmentId::new("env-1"),
            "production",
            Project {
                name: "shop".to_string(),
                repository: "acme/shop".to_string(),
                project_type,
                region: "us-central1".to_string(),
                cloud_project_id: "acme-123".to_string(),
            },
            "main",
        )
    }

    #[test]
    fn laravel_environments_get_an_app_key() {
        let mut env = environment(ProjectType::Laravel);
        seed_initial_variables(&mut env);

        assert_eq!(env.get_env_var("APP_NAME").as_deref(), Some("shop"));
        assert_eq!(env.get_env_var("APP_ENV").as_deref(), Some("production"));
        assert_eq!(env.get_env_var("APP_KEY").map(|k| k.len()), Some(32));
    }

    #[test]
    fn seeding_never_clobbers_user_variables() {
        let mut env = environment(ProjectType::Laravel);
        env.variables_blob = "APP_NAME=Custom Name".to_string();
        seed_initial_variables(&mut env);

        assert_eq!(env.get_env_var("APP_NAME").as_deref(), Some("Custom Name"));
        assert!(env.has_env_var("APP_KEY"));
    }

    #[test]
    fn rails_environments_log_to_stdout() {
        let mut env = environment(ProjectType::Rails);
        seed_initial_variables(&mut env);

        assert_eq!(env.get_env_var("RAILS_ENV").as_deref(), Some("production"));
        assert_eq!(
            env.get_env_var("RAILS_LOG_TO_STDOUT").as_deref(),
            Some("true")
        );
    }

    #[test]
    fn first_build_deploy_is_initial() {
        let mut env = environment(ProjectType::Laravel);
        assert_eq!(build_scenario(&env), Scenario::Initial);

        env.active_deployment_id = Some(DeploymentId::new("dep-1"));
        assert_eq!(build_scenario(&env), Scenario::Redeploy);
    }
}
