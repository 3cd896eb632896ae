// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup, a seeded harness, and fake providers for integration tests.

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use gantry::Orchestrator;
use gantry::model::{DatabaseBinding, Environment, Project, ProjectType};
use gantry::pipeline::{PlatformSettings, QueueConfig};
use gantry::store::Store;
use gantry::types::EnvironmentId;

#[allow(dead_code)]
pub mod fakes;

use fakes::{FakeCloud, FakeSource};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("gantry=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn test_project(project_type: ProjectType) -> Project {
    Project {
        name: "shop".to_string(),
        repository: "acme/shop".to_string(),
        project_type,
        region: "us-central1".to_string(),
        cloud_project_id: "acme-123".to_string(),
    }
}

#[allow(dead_code)]
pub fn test_environment() -> Environment {
    Environment::new(
        EnvironmentId::new("env-1"),
        "production",
        test_project(ProjectType::Laravel),
        "main",
    )
}

#[allow(dead_code)]
pub fn test_environment_with_database() -> Environment {
    let mut env = test_environment();
    env.database = Some(DatabaseBinding {
        name: "shop".to_string(),
        username: "shop".to_string(),
        password: "secret".to_string(),
        connection_string: "acme-123:us-central1:primary".to_string(),
    });
    env
}

/// Everything a pipeline test needs, wired to fast timings and fakes.
#[allow(dead_code)]
pub struct Harness {
    pub store: Arc<Store>,
    pub cloud: Arc<FakeCloud>,
    pub source: Arc<FakeSource>,
    pub orchestrator: Orchestrator,
    pub environment_id: EnvironmentId,
}

#[allow(dead_code)]
pub fn harness(cloud: FakeCloud, source: FakeSource) -> Harness {
    harness_with_environment(cloud, source, test_environment())
}

#[allow(dead_code)]
pub fn harness_with_environment(
    cloud: FakeCloud,
    source: FakeSource,
    environment: Environment,
) -> Harness {
    init_tracing();

    let store = Arc::new(Store::new());
    let environment_id = store.insert_environment(environment);
    let cloud = Arc::new(cloud);
    let source = Arc::new(source);

    let settings = PlatformSettings {
        instructions_base_url: "https://gantry.test".to_string(),
        build_poll_interval: Duration::ZERO,
    };
    let queue = QueueConfig {
        max_attempts: 3,
        max_poll_attempts: 10,
        retry_delay: Duration::ZERO,
    };

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        cloud.clone(),
        source.clone(),
        settings,
        queue,
    );

    Harness {
        store,
        cloud,
        source,
        orchestrator,
        environment_id,
    }
}
