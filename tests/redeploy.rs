// ABOUTME: Tests for redeploy scenarios: rebuilds, instant redeploys, recovery.
// ABOUTME: Chain shape is decided by deployment history, not by the caller.

mod support;

use gantry::Error;
use gantry::model::DeploymentStatus;
use gantry::pipeline::ChainResult;
use gantry::provider::SourceError;
use support::fakes::{FakeCloud, FakeSource};
use support::harness;

#[tokio::test]
async fn second_deploy_replaces_the_service() {
    let h = harness(FakeCloud::new(), FakeSource::new());

    let first = h
        .orchestrator
        .deploy(&h.environment_id, None)
        .await
        .unwrap();
    assert_eq!(first.chain.await.unwrap(), ChainResult::Succeeded);

    let second = h
        .orchestrator
        .deploy(&h.environment_id, None)
        .await
        .unwrap();
    assert_eq!(second.chain.await.unwrap(), ChainResult::Succeeded);

    let steps = h.store.steps_for(&second.deployment.id);
    assert_eq!(steps.len(), 3);

    let state = h.cloud.state.lock();
    assert_eq!(state.created.len(), 1);
    assert_eq!(state.replaced.len(), 1);
    // Create-only stages do not run again.
    assert_eq!(state.scheduler_jobs.len(), 1);
    assert_eq!(state.policy_writes, 1);
    drop(state);

    let env = h.store.environment(&h.environment_id).unwrap();
    assert_eq!(env.active_deployment_id.as_ref(), Some(&second.deployment.id));
}

#[tokio::test]
async fn hash_deploys_resolve_their_message_without_touching_head() {
    let h = harness(FakeCloud::new(), FakeSource::new());

    let started = h
        .orchestrator
        .deploy_hash(&h.environment_id, "abc123", None)
        .await
        .unwrap();
    assert_eq!(started.deployment.commit_hash, "abc123");
    assert_eq!(started.deployment.commit_message, "Ship it");
    assert_eq!(started.chain.await.unwrap(), ChainResult::Succeeded);

    // A known hash carries everything needed; HEAD is never resolved.
    assert_eq!(h.source.state.lock().head_lookups, 0);
}

#[tokio::test]
async fn hash_deploys_of_unknown_commits_are_rejected() {
    let h = harness(FakeCloud::new(), FakeSource::new());

    let err = h
        .orchestrator
        .deploy_hash(&h.environment_id, "0ddba11", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Source(SourceError::CommitNotFound(_))
    ));
    // Nothing is recorded for a deploy that never resolved its commit.
    assert!(h.store.deployments_for(&h.environment_id).is_empty());
    assert!(h.cloud.state.lock().submitted.is_empty());
}

#[tokio::test]
async fn instant_redeploy_reuses_the_image_without_building() {
    let h = harness(FakeCloud::new(), FakeSource::new());

    let first = h
        .orchestrator
        .deploy(&h.environment_id, None)
        .await
        .unwrap();
    assert_eq!(first.chain.await.unwrap(), ChainResult::Succeeded);
    let first_image = h
        .store
        .deployment(&first.deployment.id)
        .unwrap()
        .image
        .unwrap();

    let redo = h
        .orchestrator
        .redeploy(&first.deployment.id, None)
        .unwrap();
    let redo_id = redo.deployment.id.clone();
    assert_eq!(redo.chain.await.unwrap(), ChainResult::Succeeded);

    let steps = h.store.steps_for(&redo_id);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].name, "Deploy existing image");

    let redone = h.store.deployment(&redo_id).unwrap();
    assert_eq!(redone.image.as_ref(), Some(&first_image));
    assert_eq!(redone.commit_hash, first.deployment.commit_hash);

    let state = h.cloud.state.lock();
    // Only the first deploy built anything.
    assert_eq!(state.submitted.len(), 1);
    assert_eq!(state.replaced.len(), 1);
    drop(state);

    let env = h.store.environment(&h.environment_id).unwrap();
    assert_eq!(env.active_deployment_id.as_ref(), Some(&redo_id));
}

#[tokio::test]
async fn redeploying_onto_an_undeployed_environment_builds_from_scratch() {
    let h = harness(FakeCloud::failing_build("step 3 exited non-zero"), FakeSource::new());

    let first = h
        .orchestrator
        .deploy(&h.environment_id, None)
        .await
        .unwrap();
    assert_eq!(first.chain.await.unwrap(), ChainResult::Failed);
    assert_eq!(
        h.store.deployment(&first.deployment.id).unwrap().status,
        DeploymentStatus::Failed
    );

    // The remote flake clears; redeploying the failed record must rebuild and
    // run the full initial chain, since the environment never went live.
    h.cloud.state.lock().build_error = None;

    let redo = h
        .orchestrator
        .redeploy(&first.deployment.id, None)
        .unwrap();
    let redo_id = redo.deployment.id.clone();
    assert_eq!(redo.chain.await.unwrap(), ChainResult::Succeeded);

    let steps = h.store.steps_for(&redo_id);
    assert_eq!(steps.len(), 6);

    let state = h.cloud.state.lock();
    assert_eq!(state.submitted.len(), 2);
    assert_eq!(state.created.len(), 1);
}
