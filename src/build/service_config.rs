// ABOUTME: Service Configuration Builder: declarative runtime revision spec.
// ABOUTME: Pure function of deployment + environment + resolved variables.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::env_vars::EnvVars;
use crate::model::{Deployment, Environment};
use crate::types::SlugError;

#[derive(Debug, Error)]
pub enum ServiceConfigError {
    /// The deployment has no recorded image yet; the service steps run after
    /// the build, so this indicates a mis-ordered or corrupted chain.
    #[error("deployment has no built image to deploy")]
    MissingImage,

    #[error(transparent)]
    Slug(#[from] SlugError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarPair {
    pub name: String,
    pub value: String,
}

/// The declarative spec for one service revision: image, resources,
/// concurrency, scaling bounds, and the fully resolved variable set.
/// Recomputed fresh for every step execution so it always reflects the
/// environment's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub region: String,
    pub cloud_project_id: String,
    /// Digest-qualified image reference.
    pub image: String,
    pub env: Vec<EnvVarPair>,
    pub memory: String,
    pub cpu: u32,
    pub concurrency: u32,
    pub timeout_seconds: u32,
    pub max_instances: u32,
}

impl ServiceSpec {
    /// Build the spec for a deployment. Fails fast if the build has not
    /// recorded an image.
    pub fn for_deployment(
        deployment: &Deployment,
        environment: &Environment,
    ) -> Result<Self, ServiceConfigError> {
        let image = deployment
            .image
            .as_ref()
            .ok_or(ServiceConfigError::MissingImage)?;

        let vars = resolved_env_vars(environment)?;
        let env = vars
            .iter()
            .map(|(name, value)| EnvVarPair {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();

        let options = &environment.options;
        Ok(Self {
            name: environment.slug()?.to_string(),
            region: environment.region().to_string(),
            cloud_project_id: environment.cloud_project_id().to_string(),
            image: image.reference(),
            env,
            memory: options.memory.clone(),
            cpu: options.cpu,
            concurrency: options.max_requests_per_container,
            timeout_seconds: options.request_timeout,
            max_instances: options.max_instances,
        })
    }

    /// The Knative-shaped wire payload the runtime API accepts.
    pub fn to_payload(&self) -> serde_json::Value {
        let env: Vec<serde_json::Value> = self
            .env
            .iter()
            .map(|pair| json!({ "name": pair.name, "value": pair.value }))
            .collect();

        json!({
            "apiVersion": "serving.knative.dev/v1",
            "kind": "Service",
            "metadata": {
                "name": self.name,
                "namespace": self.cloud_project_id,
            },
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "autoscaling.knative.dev/maxScale": self.max_instances.to_string(),
                        },
                    },
                    "spec": {
                        "containerConcurrency": self.concurrency,
                        "timeoutSeconds": self.timeout_seconds,
                        "containers": [{
                            "image": self.image,
                            "env": env,
                            "resources": {
                                "limits": {
                                    "cpu": self.cpu.to_string(),
                                    "memory": self.memory,
                                },
                            },
                        }],
                    },
                },
            },
        })
    }
}

/// The variable set a deployment actually runs with: the environment's stored
/// blob plus platform-injected keys layered on top. Injected keys win over
/// user keys of the same name; the stored blob is never written back.
pub fn resolved_env_vars(environment: &Environment) -> Result<EnvVars, SlugError> {
    let mut vars = environment.env_vars();

    vars.set("IS_GANTRY", "true");

    if environment.project.is_laravel() {
        vars.inject([
            ("GANTRY_QUEUE", environment.queue_name()?.to_string()),
            ("GANTRY_PROJECT_ID", environment.cloud_project_id().to_string()),
            ("GANTRY_REGION", environment.region().to_string()),
            ("CACHE_DRIVER", "firestore".to_string()),
            ("QUEUE_CONNECTION", "gantry".to_string()),
            ("SESSION_DRIVER", "firestore".to_string()),
            ("LOG_CHANNEL", "syslog".to_string()),
        ]);

        if let Some(database) = &environment.database {
            vars.inject([
                ("DB_DATABASE", database.name.clone()),
                ("DB_USERNAME", database.username.clone()),
                ("DB_PASSWORD", database.password.clone()),
                (
                    "DB_SOCKET",
                    format!("/cloudsql/{}", database.connection_string),
                ),
            ]);
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatabaseBinding, Project, ProjectType};
    use crate::types::{BuiltImage, DeploymentId, EnvironmentId};

    fn environment() -> Environment {
        let mut env = Environment::new(
            EnvironmentId::new("env-1"),
            "production",
            Project {
                name: "shop".to_string(),
                repository: "acme/shop".to_string(),
                project_type: ProjectType::Laravel,
                region: "us-central1".to_string(),
                cloud_project_id: "acme-123".to_string(),
            },
            "main",
        );
        env.variables_blob = "APP_NAME=shop\nCACHE_DRIVER=redis".to_string();
        env
    }

    fn built_deployment(env: &Environment) -> Deployment {
        Deployment::new(
            DeploymentId::new("dep-1"),
            env.id.clone(),
            "abc123",
            "Ship it",
            None,
        )
        .with_image(BuiltImage::new("gcr.io/acme-123/shop-production", "sha256:f00d").unwrap())
    }

    #[test]
    fn injected_keys_override_user_keys() {
        let env = environment();

        let vars = resolved_env_vars(&env).unwrap();
        assert_eq!(vars.get("CACHE_DRIVER"), Some("firestore"));
        assert_eq!(vars.get("APP_NAME"), Some("shop"));
        // The stored blob keeps the user's value.
        assert_eq!(env.get_env_var("CACHE_DRIVER").as_deref(), Some("redis"));
    }

    #[test]
    fn database_binding_injects_socket_credentials() {
        let mut env = environment();
        env.database = Some(DatabaseBinding {
            name: "shop".to_string(),
            username: "shop".to_string(),
            password: "hunter2".to_string(),
            connection_string: "acme-123:us-central1:primary".to_string(),
        });

        let vars = resolved_env_vars(&env).unwrap();
        assert_eq!(
            vars.get("DB_SOCKET"),
            Some("/cloudsql/acme-123:us-central1:primary")
        );
        assert_eq!(vars.get("DB_PASSWORD"), Some("hunter2"));
    }

    #[test]
    fn spec_requires_a_built_image() {
        let env = environment();
        let dep = Deployment::new(
            DeploymentId::new("dep-2"),
            env.id.clone(),
            "abc",
            "msg",
            None,
        );
        assert!(matches!(
            ServiceSpec::for_deployment(&dep, &env),
            Err(ServiceConfigError::MissingImage)
        ));
    }

    #[test]
    fn spec_carries_options_and_digest_image() {
        let env = environment();
        let dep = built_deployment(&env);

        let spec = ServiceSpec::for_deployment(&dep, &env).unwrap();
        assert_eq!(spec.name, "shop-production");
        assert_eq!(spec.image, "gcr.io/acme-123/shop-production@sha256:f00d");
        assert_eq!(spec.concurrency, 80);
        assert_eq!(spec.timeout_seconds, 300);

        let payload = spec.to_payload();
        assert_eq!(
            payload["spec"]["template"]["spec"]["containers"][0]["image"],
            "gcr.io/acme-123/shop-production@sha256:f00d"
        );
        assert_eq!(
            payload["spec"]["template"]["metadata"]["annotations"]
                ["autoscaling.knative.dev/maxScale"],
            "1000"
        );
    }

    #[test]
    fn non_laravel_projects_only_get_the_platform_marker() {
        let mut env = environment();
        env.project.project_type = ProjectType::Rails;
        env.variables_blob = String::new();

        let vars = resolved_env_vars(&env).unwrap();
        assert_eq!(vars.get("IS_GANTRY"), Some("true"));
        assert!(!vars.has("GANTRY_QUEUE"));
    }
}
