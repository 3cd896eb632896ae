// ABOUTME: Project record: repository, type, region, and cloud project binding.
// ABOUTME: Project type selects build instructions and injected runtime variables.

use serde::{Deserialize, Serialize};

/// The kind of application a project contains. Selects which templated build
/// recipe (Dockerfile + entrypoint) the build fetches and which runtime
/// variables the platform injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    Laravel,
    Rails,
    NodeJs,
}

impl ProjectType {
    /// Path segment used when fetching templated build instructions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Laravel => "laravel",
            ProjectType::Rails => "rails",
            ProjectType::NodeJs => "nodejs",
        }
    }
}

/// A project groups environments that deploy the same repository. The fields
/// here are the subset the pipeline reads; team/billing ownership lives with
/// the surrounding platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Display name, slugified together with the environment name.
    pub name: String,
    /// Source repository in "owner/name" form.
    pub repository: String,
    pub project_type: ProjectType,
    /// Cloud region every environment of this project deploys into.
    pub region: String,
    /// The cloud project images and services are created under.
    pub cloud_project_id: String,
}

impl Project {
    /// The repository's own name, without the owner prefix. Revision-based
    /// builds clone into a directory with this name.
    pub fn repo_name(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.repository)
    }

    pub fn is_laravel(&self) -> bool {
        self.project_type == ProjectType::Laravel
    }
}
