// ABOUTME: Deployment record: one attempt to build and release a commit.
// ABOUTME: Status transitions are monotonic; terminal states are sticky.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BuiltImage, DeploymentId, EnvironmentId, UserId};

/// Where a deployment is in its lifecycle. Transitions only move forward:
/// `Pending → InProgress → {Successful | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Successful,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Successful | DeploymentStatus::Failed)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeploymentStateError {
    #[error("deployment is already {current:?}; cannot mark it {requested:?}")]
    TerminalStatus {
        current: DeploymentStatus,
        requested: DeploymentStatus,
    },

    #[error("deployment image is already recorded as {existing}")]
    ImageAlreadyRecorded { existing: String },
}

/// Display identity used when no platform user initiated the deploy
/// (hook-triggered pushes from unknown committers).
pub const ANONYMOUS_INITIATOR: &str = "Anonymous User";

/// A manually uploaded source archive in object storage. Deployments carrying
/// one build from the archive instead of cloning a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArchive {
    pub bucket: String,
    pub object: String,
}

/// One attempt to build and release a specific commit (or prebuilt image) to
/// an environment. Created synchronously when a deploy is requested, mutated
/// only by pipeline steps, and retained forever as audit history. A redeploy
/// always creates a new record; nothing reopens a terminal one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub environment_id: EnvironmentId,
    pub status: DeploymentStatus,
    /// Handle of the remote build operation, set once the build is submitted.
    pub operation_name: Option<String>,
    /// Digest-qualified image, recorded at most once after a successful build
    /// (or carried over on an instant redeploy).
    pub image: Option<BuiltImage>,
    pub commit_hash: String,
    pub commit_message: String,
    /// Set for manual-push deploys; such deployments build from the uploaded
    /// archive rather than a cloned revision.
    pub archive: Option<SourceArchive>,
    /// None for hook-triggered deploys from committers outside the team.
    pub initiator_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(
        id: DeploymentId,
        environment_id: EnvironmentId,
        commit_hash: impl Into<String>,
        commit_message: impl Into<String>,
        initiator_id: Option<UserId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            environment_id,
            status: DeploymentStatus::Pending,
            operation_name: None,
            image: None,
            commit_hash: commit_hash.into(),
            commit_message: commit_message.into(),
            archive: None,
            initiator_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Who to show as the deploy's initiator. Hook-triggered deploys from
    /// committers outside the team have no user record.
    pub fn initiator_display(&self) -> String {
        match &self.initiator_id {
            Some(id) => id.to_string(),
            None => ANONYMOUS_INITIATOR.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == DeploymentStatus::Failed
    }

    pub fn is_successful(&self) -> bool {
        self.status == DeploymentStatus::Successful
    }

    pub fn mark_as_in_progress(&mut self) -> Result<(), DeploymentStateError> {
        self.transition(DeploymentStatus::InProgress)
    }

    pub fn mark_as_successful(&mut self) -> Result<(), DeploymentStateError> {
        self.transition(DeploymentStatus::Successful)
    }

    pub fn mark_as_failed(&mut self) -> Result<(), DeploymentStateError> {
        self.transition(DeploymentStatus::Failed)
    }

    fn transition(&mut self, requested: DeploymentStatus) -> Result<(), DeploymentStateError> {
        if self.status == requested {
            // Re-marking the current status is harmless (queued work can race
            // a restart); it just refreshes nothing.
            return Ok(());
        }

        if self.status.is_terminal() {
            return Err(DeploymentStateError::TerminalStatus {
                current: self.status,
                requested,
            });
        }

        self.status = requested;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remember the remote build operation handle once the build is submitted.
    pub fn record_operation_name(&mut self, name: impl Into<String>) {
        self.operation_name = Some(name.into());
        self.updated_at = Utc::now();
    }

    /// Record the built image. Allowed at most once; a second call with a
    /// different image is a bug in the chain.
    pub fn record_image(&mut self, image: BuiltImage) -> Result<(), DeploymentStateError> {
        match &self.image {
            Some(existing) if *existing == image => Ok(()),
            Some(existing) => Err(DeploymentStateError::ImageAlreadyRecorded {
                existing: existing.reference(),
            }),
            None => {
                self.image = Some(image);
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Seed a carried-over image at creation time (instant redeploy).
    pub fn with_image(mut self, image: BuiltImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Attach an uploaded source archive (manual-push deploys).
    pub fn with_archive(mut self, archive: SourceArchive) -> Self {
        self.archive = Some(archive);
        self
    }
}
