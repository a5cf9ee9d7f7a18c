//! Cluster and host registration with the managed Kubernetes service
//!
//! The cluster is registered once its network, endpoint and bastion exist;
//! hosts are registered once the cluster has a registration id. Recorded
//! registration ids make both calls one-shot.

use super::Reconciler;
use crate::error::ControllerError;
use crate::scope::{ClusterIdentity, ClusterView, MachineScope};
use crds::{UCloudClusterSpec, UCloudClusterStatus};
use tracing::{debug, info};
use ucloud_client::{RegisterClusterRequest, RegisterHostRequest};

impl Reconciler {
    /// Register the cluster unless a registration id is recorded
    pub(crate) async fn register_cluster(
        &self,
        identity: &ClusterIdentity,
        spec: &UCloudClusterSpec,
        status: &mut UCloudClusterStatus,
    ) -> Result<(), ControllerError> {
        if !status.cluster_id.is_empty() {
            debug!("Cluster {} already registered as {}", identity, status.cluster_id);
            return Ok(());
        }

        let cluster_network = spec.cluster_network.clone().unwrap_or_default();
        let network = &status.network;
        let request = RegisterClusterRequest {
            vpc_id: network.vpc.vpc_id.clone(),
            subnet_id: network.subnet.subnet_id.clone(),
            pod_cidr: cluster_network.pod_cidr,
            natgw_id: network.nat.nat_gateway_id.clone(),
            service_cidr: cluster_network.service_cidr,
            cluster_name: identity.name.clone(),
            ulb_id: network.ulb.load_balancer_id.clone(),
            fw_id: network.firewall.firewall_id.clone(),
            node_cidr: network.subnet.cidr_block.clone(),
            k8s_version: spec.version.clone(),
            api_server: status.control_plane_endpoint.as_ref().map(ToString::to_string).unwrap_or_default(),
            bastion_id: status.bastion.as_ref().map(|b| b.instance_id.clone()),
            bastion_zone: status.bastion.as_ref().map(|b| b.zone.clone()),
        };
        debug!("Registering cluster {:?}", request);

        let cluster_id = self
            .registration
            .register_cluster(&identity.request_context(), &request)
            .await
            .map_err(|e| ControllerError::reconcile("cluster registration", identity.to_string(), e.into()))?;
        info!("Registered cluster {} as {}", identity, cluster_id);
        status.cluster_id = cluster_id;
        Ok(())
    }

    /// Remove the cluster registration, if any
    pub(crate) async fn deregister_cluster(
        &self,
        identity: &ClusterIdentity,
        status: &mut UCloudClusterStatus,
    ) -> Result<(), ControllerError> {
        if status.cluster_id.is_empty() {
            return Ok(());
        }
        self.registration
            .deregister_cluster(&identity.request_context(), &status.cluster_id)
            .await
            .map_err(|e| ControllerError::reconcile("cluster registration", status.cluster_id.clone(), e.into()))?;
        info!("Deregistered cluster {} ({})", identity, status.cluster_id);
        status.cluster_id.clear();
        Ok(())
    }

    /// Register the machine's instance with its cluster
    ///
    /// Returns `false` while the cluster itself is not registered yet.
    pub(crate) async fn register_host(
        &self,
        cluster: &ClusterView<'_>,
        machine: &mut MachineScope<'_>,
    ) -> Result<bool, ControllerError> {
        if !machine.status.cluster_id.is_empty() {
            return Ok(true);
        }
        if cluster.status.cluster_id.is_empty() {
            debug!("Cluster {} is not registered yet, deferring host {}", cluster.identity, machine);
            return Ok(false);
        }
        let Some(instance_id) = machine.instance_id() else {
            return Ok(false);
        };

        let request = RegisterHostRequest {
            cluster_id: cluster.status.cluster_id.clone(),
            instance_id,
            zone: machine.zone().to_string(),
            role: machine.role().to_string(),
        };
        self.registration
            .register_host(&cluster.identity.request_context(), &request)
            .await
            .map_err(|e| ControllerError::reconcile("host registration", request.instance_id.clone(), e.into()))?;
        info!(
            "Registered {} {} in cluster {}",
            request.role, request.instance_id, request.cluster_id
        );
        machine.status.cluster_id = request.cluster_id;
        Ok(true)
    }

    /// Remove the machine's instance from its cluster registration
    pub(crate) async fn deregister_host(
        &self,
        cluster: &ClusterView<'_>,
        instance_id: &str,
    ) -> Result<(), ControllerError> {
        if cluster.status.cluster_id.is_empty() {
            return Ok(());
        }
        self.registration
            .deregister_host(&cluster.identity.request_context(), &cluster.status.cluster_id, instance_id)
            .await
            .map_err(|e| ControllerError::reconcile("host registration", instance_id, e.into()))?;
        info!("Deregistered {} from cluster {}", instance_id, cluster.status.cluster_id);
        Ok(())
    }
}
