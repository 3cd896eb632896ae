// ABOUTME: Scheduler job spec for the environment's periodic tick.
// ABOUTME: Fires every minute against the deployed service's scheduler endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Environment;
use crate::types::SlugError;

#[derive(Debug, Error)]
pub enum SchedulerConfigError {
    /// The scheduler targets the service URL, so the mark-urls step must have
    /// run first.
    #[error("environment has no url to schedule against")]
    MissingUrl,

    #[error(transparent)]
    Slug(#[from] SlugError),
}

/// Declarative spec for the per-environment scheduler job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerJobSpec {
    /// Fully qualified job name: projects/{project}/locations/{region}/jobs/{slug}.
    pub name: String,
    /// Cron expression; every minute, on the minute.
    pub schedule: String,
    pub uri: String,
    pub http_method: String,
}

impl SchedulerJobSpec {
    pub fn for_environment(environment: &Environment) -> Result<Self, SchedulerConfigError> {
        let url = environment
            .url
            .as_deref()
            .ok_or(SchedulerConfigError::MissingUrl)?;
        let slug = environment.slug()?;

        Ok(Self {
            name: format!(
                "projects/{}/locations/{}/jobs/{}",
                environment.cloud_project_id(),
                environment.region(),
                slug
            ),
            schedule: "* * * * *".to_string(),
            uri: format!("{}/_gantry/schedule/run", url.trim_end_matches('/')),
            http_method: "POST".to_string(),
        })
    }
}
