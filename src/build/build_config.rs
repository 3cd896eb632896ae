// ABOUTME: Build Configuration Builder: turns a deployment into remote build instructions.
// ABOUTME: Ordered steps, source selection, and the deterministic image location.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Deployment, Environment};
use crate::types::SlugError;

#[derive(Debug, Error)]
pub enum BuildConfigError {
    /// Neither an uploaded archive nor a resolvable revision. The original
    /// system left this branch unimplemented; we fail fast before any remote
    /// call is made.
    #[error("deployment has no usable source (no archive and no commit)")]
    MissingSource,

    #[error(transparent)]
    Slug(#[from] SlugError),
}

/// How the build service obtains the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A previously uploaded source archive in object storage.
    Manual { bucket: String, object: String },
    /// Clone the repository via an authenticated URL and check out the
    /// deployment's commit.
    Revision { clone_url: String },
}

/// Storage reference for manual-push builds, in the build service's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSource {
    pub bucket: String,
    pub object: String,
}

/// One command executed by the build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Builder image that runs this step.
    pub name: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Working directory inside the source tree. Omitted for manual builds,
    /// which extract the archive at the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// The full payload submitted to the remote build service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInstructions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StorageSource>,
    pub steps: Vec<BuildStep>,
    /// Every tag the build produces. Exactly one in the current design.
    pub images: Vec<String>,
}

const DOCKER_BUILDER: &str = "gcr.io/cloud-builders/docker";
const GIT_BUILDER: &str = "gcr.io/cloud-builders/git";
const CURL_BUILDER: &str = "gcr.io/cloud-builders/curl";

/// Builds the instructions for one deployment. Pure: reads the deployment and
/// environment, performs no I/O, and is recomputed on every execution so a
/// changed environment is picked up by the next deploy.
#[derive(Debug)]
pub struct BuildConfig<'a> {
    deployment: &'a Deployment,
    environment: &'a Environment,
    source: SourceKind,
    /// Base URL the templated build instructions (Dockerfile, entrypoint)
    /// are fetched from.
    instructions_base_url: &'a str,
}

impl<'a> BuildConfig<'a> {
    pub fn new(
        deployment: &'a Deployment,
        environment: &'a Environment,
        source: SourceKind,
        instructions_base_url: &'a str,
    ) -> Self {
        Self {
            deployment,
            environment,
            source,
            instructions_base_url,
        }
    }

    /// The registry location images for this environment build to and cache
    /// from. Pure function of (cloud project id, environment slug), so every
    /// deploy of the same environment converges on the same tag.
    pub fn image_location(&self) -> Result<String, BuildConfigError> {
        Ok(image_location_for(self.environment)?)
    }

    /// The ordered step list: warm the cache, obtain sources, fetch the
    /// templated build recipe, build, push.
    pub fn steps(&self) -> Result<Vec<BuildStep>, BuildConfigError> {
        let image = self.image_location()?;
        let dir = self.working_dir();

        let steps = [
            // Pull the previous image so the build can reuse its layers.
            // Best effort: a missing :latest must not abort the build.
            Some(BuildStep {
                name: DOCKER_BUILDER.to_string(),
                entrypoint: Some("bash".to_string()),
                args: vec![
                    "-c".to_string(),
                    format!("docker pull {image}:latest || exit 0"),
                ],
                dir: None,
            }),
            self.clone_step(),
            self.checkout_step(),
            Some(BuildStep {
                name: CURL_BUILDER.to_string(),
                args: vec![
                    self.build_instructions_url("Dockerfile"),
                    "--output".to_string(),
                    "Dockerfile".to_string(),
                ],
                entrypoint: None,
                dir: dir.clone(),
            }),
            Some(BuildStep {
                name: CURL_BUILDER.to_string(),
                args: vec![
                    self.build_instructions_url("docker-entrypoint"),
                    "--output".to_string(),
                    "docker-entrypoint.sh".to_string(),
                ],
                entrypoint: None,
                dir: dir.clone(),
            }),
            Some(BuildStep {
                name: DOCKER_BUILDER.to_string(),
                args: vec![
                    "build".to_string(),
                    "-t".to_string(),
                    image.clone(),
                    "--cache-from".to_string(),
                    format!("{image}:latest"),
                    ".".to_string(),
                ],
                entrypoint: None,
                dir: dir.clone(),
            }),
            Some(BuildStep {
                name: DOCKER_BUILDER.to_string(),
                args: vec!["push".to_string(), image],
                entrypoint: None,
                dir,
            }),
        ];

        // No-op steps (revision-only stages on a manual build) drop out here.
        Ok(steps.into_iter().flatten().collect())
    }

    /// The `{source, steps, images}` payload for the build service.
    pub fn instructions(&self) -> Result<BuildInstructions, BuildConfigError> {
        Ok(BuildInstructions {
            source: self.storage_source(),
            steps: self.steps()?,
            images: vec![self.image_location()?],
        })
    }

    fn storage_source(&self) -> Option<StorageSource> {
        match &self.source {
            SourceKind::Manual { bucket, object } => Some(StorageSource {
                bucket: bucket.clone(),
                object: object.clone(),
            }),
            SourceKind::Revision { .. } => None,
        }
    }

    fn clone_step(&self) -> Option<BuildStep> {
        match &self.source {
            SourceKind::Revision { clone_url, .. } => Some(BuildStep {
                name: GIT_BUILDER.to_string(),
                args: vec!["clone".to_string(), clone_url.clone()],
                entrypoint: None,
                dir: None,
            }),
            SourceKind::Manual { .. } => None,
        }
    }

    fn checkout_step(&self) -> Option<BuildStep> {
        match &self.source {
            SourceKind::Revision { .. } => Some(BuildStep {
                name: GIT_BUILDER.to_string(),
                args: vec![
                    "checkout".to_string(),
                    self.deployment.commit_hash.clone(),
                ],
                entrypoint: None,
                dir: self.working_dir(),
            }),
            SourceKind::Manual { .. } => None,
        }
    }

    /// Revision builds clone into a directory named after the repository;
    /// manual archives extract at the root, so no dir qualifier is used.
    fn working_dir(&self) -> Option<String> {
        match self.source {
            SourceKind::Revision { .. } => {
                Some(self.environment.project.repo_name().to_string())
            }
            SourceKind::Manual { .. } => None,
        }
    }

    fn build_instructions_url(&self, file: &str) -> String {
        format!(
            "{}/build-instructions/{}/{}",
            self.instructions_base_url.trim_end_matches('/'),
            self.environment.project.project_type.as_str(),
            file
        )
    }
}

/// See [`BuildConfig::image_location`]; exposed separately so service config
/// and tests can compute it without a deployment in hand.
pub fn image_location_for(environment: &Environment) -> Result<String, SlugError> {
    Ok(format!(
        "gcr.io/{}/{}",
        environment.cloud_project_id(),
        environment.slug()?
    ))
}
