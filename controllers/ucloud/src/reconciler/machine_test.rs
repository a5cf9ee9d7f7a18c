//! Unit tests for machine orchestration

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::{EMPTY_STATE_REQUEUE_AFTER, REQUEUE_AFTER, ReconcileOutcome};
    use crate::scope::{ClusterView, MachineScope};
    use crate::test_utils::*;
    use crds::{MachineAddressType, UCloudClusterStatus, UCloudMachineSpec, UCloudMachineStatus};
    use ucloud_client::UHostInstance;

    fn provider_id(instance_id: &str) -> String {
        format!("ucloud://{TEST_PROJECT}/cn-bj2-02/{instance_id}")
    }

    fn existing_machine_spec(instance_id: &str) -> UCloudMachineSpec {
        UCloudMachineSpec {
            provider_id: Some(provider_id(instance_id)),
            ..test_machine_spec()
        }
    }

    fn add_uhost(env: &TestEnv, id: &str, state: &str) {
        env.mock.add_uhost(UHostInstance {
            uhost_id: id.to_string(),
            name: format!("{TEST_NAMESPACE}-worker-0"),
            zone: "cn-bj2-02".to_string(),
            state: state.to_string(),
            tag: test_identity().group_name(),
            ..Default::default()
        });
    }

    /// Backends of the cluster's API server VServer
    fn backends(env: &TestEnv) -> Vec<String> {
        env.mock.load_balancers()[0].vserver_set[0]
            .backend_set
            .iter()
            .map(|b| b.resource_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_machine_is_created_and_registered() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };
        env.mock.clear_calls();

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        let provider = machine.provider_id.clone();

        assert_eq!(outcome, ReconcileOutcome::Done);
        let uhost = env.mock.uhosts().into_iter().find(|h| h.name == "default-worker-0").unwrap();
        assert_eq!(provider, Some(provider_id(&uhost.uhost_id)));
        assert!(status.ready);
        assert_eq!(status.instance_id, uhost.uhost_id);
        assert_eq!(status.zone, "cn-bj2-02");
        assert_eq!(status.instance_state.as_deref(), Some("Running"));
        assert_eq!(status.addresses.len(), 1);
        assert_eq!(status.addresses[0].address_type, MachineAddressType::InternalIP);
        assert_eq!(status.cluster_id, cluster_status.cluster_id);
        assert_eq!(env.mock.calls_of("AllocateBackend"), 0);

        let hosts = env.mock.registered_hosts();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].instance_id, uhost.uhost_id);
        assert_eq!(hosts[0].role, "node");
        assert_eq!(hosts[0].zone, "cn-bj2-02");
    }

    #[tokio::test]
    async fn test_control_plane_machine_joins_load_balancer() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        let provider = machine.provider_id.clone();

        assert_eq!(backends(&env), vec![status.instance_id.clone()]);
        assert_eq!(env.mock.registered_hosts()[0].role, "master");

        // Second pass with the provider id recorded adds nothing
        let machine_spec = UCloudMachineSpec {
            provider_id: provider,
            ..test_machine_spec()
        };
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(env.mock.calls_of("CreateUHostInstance"), 1);
        assert_eq!(env.mock.calls_of("AllocateBackend"), 1);
        assert_eq!(env.mock.calls_of("CreateCAPUHost"), 1);
    }

    #[tokio::test]
    async fn test_machine_waits_for_cluster_and_bootstrap_data() {
        let env = test_env();
        let identity = test_identity();
        let spec = test_cluster_spec();
        let not_ready = UCloudClusterStatus::default();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &not_ready };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        let ready = UCloudClusterStatus {
            ready: true,
            ..Default::default()
        };
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &ready };
        let machine_spec = UCloudMachineSpec {
            bootstrap_data_secret_name: None,
            ..test_machine_spec()
        };
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        assert!(env.mock.calls().is_empty());
        assert_eq!(status, UCloudMachineStatus::default());
    }

    #[tokio::test]
    async fn test_failed_machine_is_not_reconciled() {
        let env = test_env();
        let identity = test_identity();
        let spec = test_cluster_spec();
        let ready = UCloudClusterStatus {
            ready: true,
            ..Default::default()
        };
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &ready };
        let machine_spec = existing_machine_spec("uhost-1");
        let mut status = UCloudMachineStatus {
            failure_reason: Some("UpdateMachineError".to_string()),
            ..Default::default()
        };

        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(env.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pending_instance_requeues() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };
        add_uhost(&env, "uhost-pending", "Starting");

        let machine_spec = existing_machine_spec("uhost-pending");
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        assert!(!status.ready);
        assert_eq!(status.instance_state.as_deref(), Some("Starting"));
        assert!(!status.has_failed());
    }

    #[tokio::test]
    async fn test_empty_state_requeues_quickly() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };
        add_uhost(&env, "uhost-blank", "");

        let machine_spec = existing_machine_spec("uhost-blank");
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(EMPTY_STATE_REQUEUE_AFTER));
        assert!(env.mock.registered_hosts().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_state_fails_machine_and_leaves_load_balancer() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        let provider = machine.provider_id.clone();
        let instance_id = status.instance_id.clone();
        assert_eq!(backends(&env), vec![instance_id.clone()]);

        env.mock.queue_uhost_states(&instance_id, &["Install Fail"]);
        let machine_spec = UCloudMachineSpec {
            provider_id: provider,
            ..test_machine_spec()
        };
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(!status.ready);
        assert_eq!(status.failure_reason.as_deref(), Some("UpdateMachineError"));
        assert_eq!(
            status.failure_message,
            Some(format!("uhost instance {instance_id} state \"Install Fail\" is unexpected"))
        );
        assert!(backends(&env).is_empty());

        // Terminal: the next pass makes no calls
        env.mock.clear_calls();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        assert!(env.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_instance_fails_machine() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = existing_machine_spec("uhost-deleted");
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(status.failure_reason.as_deref(), Some("UpdateMachineError"));
        assert!(status.failure_message.unwrap().contains("cannot be found"));
        assert_eq!(env.mock.calls_of("CreateUHostInstance"), 0);
    }

    #[tokio::test]
    async fn test_version_bump_keeps_existing_instance() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        let provider = machine.provider_id.clone();

        let mut upgraded = test_identity();
        upgraded.version = "v1.19.0".to_string();
        assert_ne!(upgraded.group_name(), cluster_status.group.group_name);
        let cluster = ClusterView { identity: &upgraded, spec: &spec, status: &cluster_status };
        assert_eq!(cluster.tag(), cluster_status.group.group_name);

        let machine_spec = UCloudMachineSpec {
            provider_id: provider,
            ..test_machine_spec()
        };
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(!status.has_failed());
        assert!(status.ready);
        assert_eq!(env.mock.calls_of("CreateUHostInstance"), 1);

        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        env.reconciler.delete_machine(cluster, &mut machine).await.unwrap();
        assert_eq!(env.mock.calls_of("TerminateUHostInstance"), 1);
        assert!(env.mock.uhosts().is_empty());
    }

    #[tokio::test]
    async fn test_host_registration_waits_for_cluster_registration() {
        let env = test_env();
        let spec = test_cluster_spec();
        let mut cluster_status = ready_cluster_status(&env, &spec).await;
        cluster_status.cluster_id.clear();
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        assert!(status.ready);
        assert!(status.cluster_id.is_empty());
        assert_eq!(env.mock.calls_of("CreateCAPUHost"), 0);
    }

    #[tokio::test]
    async fn test_create_failure_names_the_machine() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };
        env.mock.fail_with_retcode("CreateUHostInstance", 8000);

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let err = env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap_err();

        assert!(matches!(&err, ControllerError::Machine { name, .. } if name == "worker-0"));
        assert!(!status.has_failed(), "transient errors are retried, not terminal");
    }

    #[tokio::test]
    async fn test_delete_releases_backend_host_and_instance() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        env.reconciler.reconcile_machine(cluster, &mut machine).await.unwrap();
        let provider = machine.provider_id.clone();
        env.mock.clear_calls();

        let machine_spec = UCloudMachineSpec {
            provider_id: provider,
            ..test_machine_spec()
        };
        let mut machine = MachineScope::new(TEST_NAMESPACE, "cp-0", &machine_spec, &mut status, true);
        let outcome = env.reconciler.delete_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        let teardown: Vec<String> = env
            .mock
            .calls()
            .into_iter()
            .filter(|c| ["ReleaseBackend", "DeleteCAPUHost", "PoweroffUHostInstance", "TerminateUHostInstance"].contains(&c.as_str()))
            .collect();
        assert_eq!(
            teardown,
            vec!["ReleaseBackend", "DeleteCAPUHost", "PoweroffUHostInstance", "TerminateUHostInstance"]
        );
        assert!(backends(&env).is_empty());
        assert!(env.mock.registered_hosts().is_empty());
        assert!(env.mock.uhosts().is_empty());
        assert!(!status.ready);
        assert_eq!(status.instance_state.as_deref(), Some("Stopped"));
    }

    #[tokio::test]
    async fn test_delete_without_instance_is_a_no_op() {
        let env = test_env();
        let spec = test_cluster_spec();
        let cluster_status = ready_cluster_status(&env, &spec).await;
        let identity = test_identity();
        let cluster = ClusterView { identity: &identity, spec: &spec, status: &cluster_status };
        env.mock.clear_calls();

        let machine_spec = test_machine_spec();
        let mut status = UCloudMachineStatus::default();
        let mut machine = MachineScope::new(TEST_NAMESPACE, "worker-0", &machine_spec, &mut status, false);
        let outcome = env.reconciler.delete_machine(cluster, &mut machine).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(env.mock.calls().is_empty());
    }
}
