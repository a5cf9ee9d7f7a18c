//! Test utilities for unit testing reconcilers
//!
//! Builds a `Reconciler` over the in-memory provider mock with a virtual clock,
//! an in-memory secret store and a seeded zone source, plus spec fixtures.

use crate::clock::ManualClock;
use crate::config::RegionTable;
use crate::placement::SeededZoneSelector;
use crate::reconciler::Reconciler;
use crate::scope::ClusterIdentity;
use crate::secrets::InMemorySecretStore;
use crds::{BastionSpec, UCloudClusterSpec, UCloudClusterStatus, UCloudMachineSpec};
use std::sync::Arc;
use ucloud_client::{Credential, Firewall, MockUCloudClient};

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_CLUSTER: &str = "demo";
pub const TEST_REGION: &str = "cn-bj2";
pub const TEST_PROJECT: &str = "org-test";
pub const TEST_VERSION: &str = "v1.18.3";
pub const TEST_FIREWALL: &str = "firewall-default";
pub const BOOTSTRAP_SECRET: &str = "demo-bootstrap";

/// `password`, base64 encoded
pub const TEST_PASSWORD: &str = "cGFzc3dvcmQ=";

/// A reconciler wired to fakes, with handles to inspect them
pub struct TestEnv {
    pub reconciler: Reconciler,
    pub mock: MockUCloudClient,
    pub clock: Arc<ManualClock>,
    pub secrets: Arc<InMemorySecretStore>,
}

pub fn test_env() -> TestEnv {
    let mock = MockUCloudClient::new();
    let clock = Arc::new(ManualClock::new());
    let secrets = Arc::new(InMemorySecretStore::new());
    secrets.insert(
        TEST_NAMESPACE,
        BOOTSTRAP_SECRET,
        b"## template: jinja\n#cloud-config\nucloud: UCLOUD_CREDENTIAL\nversion: KUBERNETES_VERSION\n",
    );
    let credential = Credential {
        public_key: "test-public".to_string(),
        private_key: "test-private".to_string(),
    };
    let reconciler = Reconciler::new(
        Arc::new(mock.clone()),
        Arc::new(mock.clone()),
        secrets.clone(),
        Arc::new(RegionTable::default()),
        credential,
    )
    .with_clock(clock.clone())
    .with_zone_selector(Arc::new(SeededZoneSelector::new(7)));
    TestEnv {
        reconciler,
        mock,
        clock,
        secrets,
    }
}

/// Helper to create a reconciler over a fresh mock
pub fn create_test_reconciler() -> (Reconciler, MockUCloudClient) {
    let env = test_env();
    (env.reconciler, env.mock)
}

pub fn test_identity() -> ClusterIdentity {
    ClusterIdentity {
        namespace: TEST_NAMESPACE.to_string(),
        name: TEST_CLUSTER.to_string(),
        project_id: TEST_PROJECT.to_string(),
        region: TEST_REGION.to_string(),
        version: TEST_VERSION.to_string(),
        creation_timestamp: "2020-06-01T08:00:00Z".to_string(),
    }
}

pub fn test_cluster_spec() -> UCloudClusterSpec {
    UCloudClusterSpec {
        region: TEST_REGION.to_string(),
        project_id: TEST_PROJECT.to_string(),
        version: TEST_VERSION.to_string(),
        ..Default::default()
    }
}

pub fn test_cluster_spec_with_bastion() -> UCloudClusterSpec {
    UCloudClusterSpec {
        bastion: Some(BastionSpec {
            ssh_password: TEST_PASSWORD.to_string(),
            zone: "cn-bj2-03".to_string(),
        }),
        ..test_cluster_spec()
    }
}

pub fn test_machine_spec() -> UCloudMachineSpec {
    UCloudMachineSpec {
        ssh_password: TEST_PASSWORD.to_string(),
        failure_domain: Some("cn-bj2-02".to_string()),
        bootstrap_data_secret_name: Some(BOOTSTRAP_SECRET.to_string()),
        ..Default::default()
    }
}

/// The project's default firewall, which NAT gateway creation resolves
pub fn add_default_firewall(mock: &MockUCloudClient) {
    mock.add_firewall(Firewall {
        fw_id: TEST_FIREWALL.to_string(),
        name: "Web server recommendation".to_string(),
        firewall_type: "recommend web".to_string(),
    });
}

/// Status of a cluster whose infrastructure is fully reconciled
pub async fn ready_cluster_status(env: &TestEnv, spec: &UCloudClusterSpec) -> UCloudClusterStatus {
    use crate::reconciler::ReconcileOutcome;
    use crate::scope::ClusterScope;

    add_default_firewall(&env.mock);
    let mut status = UCloudClusterStatus::default();
    let mut scope = ClusterScope::new(test_identity(), spec, &mut status);
    let outcome = env.reconciler.reconcile_cluster(&mut scope).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
    status
}
