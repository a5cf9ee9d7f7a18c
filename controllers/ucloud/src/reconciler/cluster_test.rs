//! Unit tests for cluster orchestration

#[cfg(test)]
mod tests {
    use crate::reconcile_helpers::CloudContext;
    use crate::reconciler::{REQUEUE_AFTER, ReconcileOutcome};
    use crate::scope::ClusterScope;
    use crate::test_utils::*;
    use crds::{ClusterNetworkSpec, UCloudClusterStatus};
    use ucloud_client::{GroupResource, RequestContext, UHostInstance};

    fn provisioning_calls(calls: &[String]) -> Vec<String> {
        calls
            .iter()
            .filter(|c| c.starts_with("Create") || c.starts_with("Allocate") || c.starts_with("Bind"))
            .cloned()
            .collect()
    }

    fn teardown_calls(calls: &[String]) -> Vec<String> {
        calls
            .iter()
            .filter(|c| c.starts_with("Delete") || c.starts_with("Terminate"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_empty_cluster_is_provisioned_in_order() {
        let env = test_env();
        add_default_firewall(&env.mock);
        env.mock.set_eip_address_pending(true);
        let spec = test_cluster_spec();
        let mut status = UCloudClusterStatus::default();

        let outcome = {
            let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
            env.reconciler.reconcile_cluster(&mut scope).await.unwrap()
        };

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        assert_eq!(
            provisioning_calls(&env.mock.calls()),
            vec![
                "CreateBusinessGroup",
                "CreateVPC",
                "CreateSubnet",
                "AllocateEIP",
                "CreateNATGW",
                "CreateULB",
                "AllocateEIP",
                "BindEIP",
                "CreateVServer",
            ]
        );
        assert_eq!(env.mock.vpcs()[0].network, vec!["10.0.0.0/8".to_string()]);
        assert!(!status.ready);
        assert!(status.control_plane_endpoint.is_none());
        assert!(status.cluster_id.is_empty());
        assert_eq!(status.group.group_name, test_identity().group_name());

        env.mock.assign_pending_eip_addresses();
        env.mock.clear_calls();
        let outcome = {
            let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
            env.reconciler.reconcile_cluster(&mut scope).await.unwrap()
        };

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(env.mock.calls(), vec!["DescribeEIP", "CreateCAPUCluster"]);
        assert!(status.ready);
        let endpoint = status.control_plane_endpoint.clone().unwrap();
        assert_eq!(endpoint.host, status.network.ulb.eip.eip_addr);
        assert_eq!(endpoint.port, 6443);
        assert_eq!(
            status.failure_domains.keys().cloned().collect::<Vec<_>>(),
            vec!["cn-bj2-02", "cn-bj2-03", "cn-bj2-04", "cn-bj2-05"]
        );
        assert!(status.failure_domains.values().all(|d| d.control_plane));
        assert!(!status.cluster_id.is_empty());
    }

    #[tokio::test]
    async fn test_reconciled_cluster_is_a_pure_short_circuit() {
        let env = test_env();
        let spec = test_cluster_spec();
        let mut status = ready_cluster_status(&env, &spec).await;
        let before = status.clone();
        env.mock.clear_calls();

        let outcome = {
            let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
            env.reconciler.reconcile_cluster(&mut scope).await.unwrap()
        };

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(env.mock.calls().is_empty(), "unexpected calls {:?}", env.mock.calls());
        assert_eq!(status, before);
    }

    #[tokio::test]
    async fn test_existing_business_group_is_adopted() {
        let env = test_env();
        let spec = test_cluster_spec();
        let first = ready_cluster_status(&env, &spec).await;

        // Status lost, resources still tagged with the same group
        let mut status = UCloudClusterStatus::default();
        let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
        env.reconciler.reconcile_cluster(&mut scope).await.unwrap();

        assert_eq!(env.mock.business_groups().len(), 1);
        assert_eq!(env.mock.vpcs().len(), 1);
        assert_eq!(env.mock.subnets().len(), 1);
        assert_eq!(status.group.group_id, first.group.group_id);
        assert_eq!(status.network.vpc.vpc_id, first.network.vpc.vpc_id);
    }

    #[tokio::test]
    async fn test_registration_carries_network_and_bastion() {
        let env = test_env();
        let spec = crds::UCloudClusterSpec {
            cluster_network: Some(ClusterNetworkSpec {
                pod_cidr: "172.16.0.0/16".to_string(),
                service_cidr: "10.100.0.0/16".to_string(),
            }),
            ..test_cluster_spec_with_bastion()
        };

        let status = ready_cluster_status(&env, &spec).await;

        let bastion = status.bastion.clone().unwrap();
        assert_eq!(bastion.name, "default-demo-bastion");
        assert_eq!(bastion.zone, "cn-bj2-03");
        assert_eq!(bastion.instance_type, "uhost");
        assert!(!bastion.private_ip.is_empty());
        assert!(!bastion.public_ip.is_empty(), "public address on the Bgp line");

        let request = env.mock.last_uhost_request().unwrap();
        assert_eq!((request.cpu, request.memory), (2, 4096));
        assert_eq!(request.disks.len(), 1);
        assert!(request.user_data.is_none());
        let eip = request.eip.unwrap();
        assert_eq!((eip.bandwidth, eip.operator_name.as_str(), eip.pay_mode.as_str()), (1, "Bgp", "Bandwidth"));

        let registration = env.mock.last_cluster_registration().unwrap();
        assert_eq!(registration.pod_cidr, "172.16.0.0/16");
        assert_eq!(registration.service_cidr, "10.100.0.0/16");
        assert_eq!(registration.node_cidr, "10.0.0.0/16");
        assert_eq!(registration.api_server, format!("{}:6443", status.network.ulb.eip.eip_addr));
        assert_eq!(registration.fw_id, TEST_FIREWALL);
        assert_eq!(registration.k8s_version, TEST_VERSION);
        assert_eq!(registration.bastion_id, Some(bastion.instance_id));
        assert_eq!(registration.bastion_zone, Some("cn-bj2-03".to_string()));
    }

    #[tokio::test]
    async fn test_delete_waits_for_machines() {
        let env = test_env();
        let spec = test_cluster_spec();
        let mut status = ready_cluster_status(&env, &spec).await;
        env.mock.clear_calls();

        let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
        let outcome = env.reconciler.delete_cluster(&mut scope, 2).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        assert!(env.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tears_down_in_reverse_order() {
        let env = test_env();
        let spec = test_cluster_spec_with_bastion();
        let mut status = ready_cluster_status(&env, &spec).await;
        env.mock.clear_calls();

        let outcome = {
            let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
            env.reconciler.delete_cluster(&mut scope, 0).await.unwrap()
        };

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(
            teardown_calls(&env.mock.calls()),
            vec![
                "TerminateUHostInstance",
                "DeleteULB",
                "DeleteNATGW",
                "DeleteSubnet",
                "DeleteVPC",
                "DeleteBusinessGroup",
                "DeleteCAPUCluster",
            ]
        );
        assert_eq!(env.mock.calls_of("SearchBusinessGroupResource"), 1);
        assert!(env.mock.vpcs().is_empty());
        assert!(env.mock.subnets().is_empty());
        assert!(env.mock.nat_gateways().is_empty());
        assert!(env.mock.load_balancers().is_empty());
        assert!(env.mock.uhosts().is_empty());
        assert!(env.mock.business_groups().is_empty());
        assert!(env.mock.registrations().is_empty());
        assert!(status.bastion.is_none());
        assert!(status.network.vpc.vpc_id.is_empty());
        assert!(status.group.group_id.is_empty());
        assert!(status.cluster_id.is_empty());
        assert!(!status.ready);
    }

    #[tokio::test]
    async fn test_version_bump_tears_down_recorded_group() {
        let env = test_env();
        let spec = test_cluster_spec_with_bastion();
        let mut status = ready_cluster_status(&env, &spec).await;
        let group_name = status.group.group_name.clone();
        let mut upgraded = test_identity();
        upgraded.version = "v1.19.0".to_string();
        env.mock.clear_calls();

        let outcome = {
            let mut scope = ClusterScope::new(upgraded.clone(), &spec, &mut status);
            assert_eq!(scope.tag(), group_name);
            env.reconciler.reconcile_cluster(&mut scope).await.unwrap()
        };
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(env.mock.calls().is_empty(), "unexpected calls {:?}", env.mock.calls());

        let mut scope = ClusterScope::new(upgraded, &spec, &mut status);
        env.reconciler.delete_cluster(&mut scope, 0).await.unwrap();

        assert_eq!(env.mock.calls_of("TerminateUHostInstance"), 1);
        assert!(env.mock.uhosts().is_empty());
        assert!(env.mock.business_groups().is_empty());
    }

    #[tokio::test]
    async fn test_delete_keeps_operator_supplied_vpc() {
        let env = test_env();
        env.mock.add_vpc(ucloud_client::Vpc {
            vpc_id: "uvnet-shared".to_string(),
            name: "shared".to_string(),
            network: vec!["10.0.0.0/8".to_string()],
            tag: test_identity().group_name(),
        });
        let mut spec = test_cluster_spec();
        spec.network.vpc.vpc_id = "uvnet-shared".to_string();
        let mut status = ready_cluster_status(&env, &spec).await;
        assert_eq!(status.network.vpc.vpc_id, "uvnet-shared");

        let mut scope = ClusterScope::new(test_identity(), &spec, &mut status);
        env.reconciler.delete_cluster(&mut scope, 0).await.unwrap();

        assert_eq!(env.mock.calls_of("DeleteVPC"), 0);
        assert_eq!(env.mock.vpcs().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_fetches_every_resource() {
        let env = test_env();
        let spec = test_cluster_spec();
        let status = ready_cluster_status(&env, &spec).await;
        let group_id = status.group.group_id.clone();
        let tag = test_identity().group_name();

        for n in 0..11 {
            env.mock.add_group_resource(
                &group_id,
                GroupResource {
                    id: format!("ulb-leftover-{n}"),
                    resource_type_name: "ULB".to_string(),
                    zone_id: String::new(),
                },
            );
        }
        env.mock.add_uhost(UHostInstance {
            uhost_id: "uhost-leftover".to_string(),
            zone: "cn-bj2-04".to_string(),
            state: "Running".to_string(),
            tag: tag.clone(),
            ..Default::default()
        });
        env.mock.add_group_resource(
            &group_id,
            GroupResource {
                id: "uhost-leftover".to_string(),
                resource_type_name: "uhost".to_string(),
                zone_id: "cn-bj2-04".to_string(),
            },
        );
        env.mock.clear_calls();

        let ctx = RequestContext::new(TEST_REGION, TEST_PROJECT);
        let regions = crate::config::RegionTable::default();
        let cloud = CloudContext {
            cloud: &env.mock,
            ctx: &ctx,
            tag: &tag,
            regions: &regions,
        };
        env.reconciler.sweep_business_group(&cloud, &group_id).await.unwrap();

        assert_eq!(env.mock.calls_of("SearchBusinessGroupResource"), 2);
        // The cluster's own ULB is in the group too
        assert_eq!(env.mock.calls_of("DeleteULB"), 12);
        assert!(env.mock.load_balancers().is_empty());
        assert_eq!(env.mock.calls_of("TerminateUHostInstance"), 1);
        assert!(env.mock.uhosts().is_empty());
    }
}
