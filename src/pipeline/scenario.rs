// ABOUTME: Deployment scenarios and chain planning.
// ABOUTME: One closed enum, one planning function, one fixed step list per scenario.

use nonempty::{NonEmpty, nonempty};

use super::step::StepKind;

/// Why a deployment is happening. Selected once, when the deployment is
/// created, from `has_been_deployed_successfully()` plus the caller's intent;
/// every chain shape lives here rather than branching at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// The environment has never deployed successfully: build, create the
    /// service, then wire up everything a first revision needs (public
    /// access, scheduler, urls).
    Initial,
    /// A new build onto an existing service. Covers both HEAD deploys and
    /// hash-only redeploys; they differ only in how the commit was resolved.
    Redeploy,
    /// Reuse a previous deployment's image; no build at all.
    InstantRedeploy,
}

impl Scenario {
    /// The ordered chain for this scenario. Each step maps to one ledger row
    /// and one unit of queued work.
    pub fn plan(&self) -> NonEmpty<StepKind> {
        match self {
            Scenario::Initial => nonempty![
                StepKind::SubmitBuild,
                StepKind::WaitForBuild,
                StepKind::CreateService,
                StepKind::MarkUrls,
                StepKind::EnsurePublicInvoke,
                StepKind::StartScheduler,
            ],
            Scenario::Redeploy => nonempty![
                StepKind::SubmitBuild,
                StepKind::WaitForBuild,
                StepKind::ReplaceService,
            ],
            Scenario::InstantRedeploy => nonempty![StepKind::CreateOrReplaceService],
        }
    }
}
