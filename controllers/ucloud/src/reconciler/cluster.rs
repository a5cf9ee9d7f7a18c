//! UCloudCluster orchestration
//!
//! Create runs every step in dependency order and stops at the first failure
//! or unmet condition; completed steps short-circuit on the next pass. Delete
//! runs in reverse and sweeps the business group before the network goes.

use super::group::BusinessGroupKind;
use super::network::ulb::refresh_eip_address;
use super::network::{LoadBalancerKind, NatGatewayKind, SubnetKind, VpcKind};
use super::{REQUEUE_AFTER, ReconcileOutcome, Reconciler};
use crate::config::API_SERVER_PORT;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, delete_resource, reconcile_resource};
use crate::scope::{ClusterIdentity, ClusterScope};
use crds::{ApiEndpoint, FailureDomain};
use tracing::info;

/// Wrap a step failure with the cluster it happened in
fn step_failed(identity: &ClusterIdentity, step: &'static str) -> impl FnOnce(ControllerError) -> ControllerError {
    let (namespace, name) = (identity.namespace.clone(), identity.name.clone());
    move |source| ControllerError::Cluster {
        namespace,
        name,
        step,
        source: Box::new(source),
    }
}

impl Reconciler {
    /// One create-path pass over a cluster
    pub async fn reconcile_cluster(&self, scope: &mut ClusterScope<'_>) -> Result<ReconcileOutcome, ControllerError> {
        info!("Reconciling UCloudCluster {} (group {})", scope.identity, scope.tag());
        let ctx = scope.ctx().clone();
        let tag = scope.tag();
        let identity = scope.identity.clone();
        let spec = scope.spec;
        let cluster = identity.name.as_str();
        let cloud = CloudContext {
            cloud: &*self.cloud,
            ctx: &ctx,
            tag: &tag,
            regions: &self.regions,
        };

        reconcile_resource(&BusinessGroupKind::new(&tag), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "business group"))?;

        reconcile_resource(&VpcKind::new(&spec.network.vpc, cluster), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "vpc"))?;

        let subnet = SubnetKind::new(&spec.network.subnet, cluster, &scope.status.network.vpc.vpc_id);
        reconcile_resource(&subnet, &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "subnet"))?;

        let nat = NatGatewayKind::new(&spec.network.nat, &spec.network.firewall.firewall_id, cluster, scope.status);
        reconcile_resource(&nat, &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "nat gateway"))?;

        let ulb = LoadBalancerKind::new(&spec.network.ulb, cluster, &scope.status.network.vpc.vpc_id);
        reconcile_resource(&ulb, &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "load balancer"))?;

        refresh_eip_address(&cloud, &mut scope.status.network.ulb)
            .await
            .map_err(step_failed(&identity, "load balancer address"))?;
        let address = scope.status.network.ulb.eip.eip_addr.clone();
        if address.is_empty() {
            info!("Load balancer of {} has no public address yet", identity);
            scope.status.ready = false;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        }

        scope.status.control_plane_endpoint = Some(ApiEndpoint {
            host: address,
            port: API_SERVER_PORT,
        });
        let zones = self
            .regions
            .zones(&identity.region)
            .map_err(step_failed(&identity, "failure domains"))?;
        scope.status.failure_domains = zones
            .iter()
            .map(|zone| (zone.clone(), FailureDomain { control_plane: true }))
            .collect();
        scope.status.ready = true;

        self.reconcile_bastion(&cloud, &identity, spec, scope.status)
            .await
            .map_err(step_failed(&identity, "bastion"))?;

        self.register_cluster(&identity, spec, scope.status)
            .await
            .map_err(step_failed(&identity, "cluster registration"))?;

        info!("Reconciled UCloudCluster {}", identity);
        Ok(ReconcileOutcome::Done)
    }

    /// One delete-path pass over a cluster
    ///
    /// `dependents` is the number of machines still attached to the cluster;
    /// nothing is torn down until it reaches zero.
    pub async fn delete_cluster(
        &self,
        scope: &mut ClusterScope<'_>,
        dependents: usize,
    ) -> Result<ReconcileOutcome, ControllerError> {
        if dependents > 0 {
            info!("UCloudCluster {} still has {} machine(s), waiting", scope.identity, dependents);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_AFTER));
        }

        info!("Deleting UCloudCluster {} (group {})", scope.identity, scope.tag());
        let ctx = scope.ctx().clone();
        let tag = scope.tag();
        let identity = scope.identity.clone();
        let spec = scope.spec;
        let cluster = identity.name.as_str();
        let cloud = CloudContext {
            cloud: &*self.cloud,
            ctx: &ctx,
            tag: &tag,
            regions: &self.regions,
        };

        self.terminate_bastion(&cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "bastion"))?;

        let vpc_id = scope.status.network.vpc.vpc_id.clone();
        delete_resource(&LoadBalancerKind::new(&spec.network.ulb, cluster, &vpc_id), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "load balancer"))?;

        let nat = NatGatewayKind::new(&spec.network.nat, &spec.network.firewall.firewall_id, cluster, scope.status);
        delete_resource(&nat, &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "nat gateway"))?;

        let group_id = scope.status.group.group_id.clone();
        self.sweep_business_group(&cloud, &group_id)
            .await
            .map_err(step_failed(&identity, "business group sweep"))?;

        delete_resource(&SubnetKind::new(&spec.network.subnet, cluster, &vpc_id), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "subnet"))?;

        delete_resource(&VpcKind::new(&spec.network.vpc, cluster), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "vpc"))?;

        delete_resource(&BusinessGroupKind::new(&tag), &cloud, scope.status)
            .await
            .map_err(step_failed(&identity, "business group"))?;

        self.deregister_cluster(&identity, scope.status)
            .await
            .map_err(step_failed(&identity, "cluster registration"))?;

        scope.status.ready = false;
        info!("Deleted UCloudCluster {}", identity);
        Ok(ReconcileOutcome::Done)
    }
}
