//! Load balancer reconciler
//!
//! The API server load balancer is created in three steps: the ULB itself,
//! an elastic IP bound to it, and a TCP VServer on port 6443. Control plane
//! instances are then added and removed as backends of that VServer.

use super::eip::allocate_eip;
use crate::config::API_SERVER_PORT;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, ResourceKind};
use crds::{EipSpec, EipStatus, UCloudClusterStatus, UlbSpec, UlbStatus};
use tracing::{debug, info};
use ucloud_client::{
    AllocateBackendRequest, CreateLoadBalancerRequest, CreateVServerRequest, LoadBalancer, LoadBalancerIp,
    RequestContext, ResourceFilter, UCloudClientTrait, UCloudError, VServer, retcode,
};

const LISTEN_TYPE: &str = "RequestProxy";
const DEFAULT_VSERVER_NAME: &str = "k8s-api-server";

/// The API server load balancer, owned by the cluster VPC
#[derive(Debug)]
pub(crate) struct LoadBalancerKind {
    id: String,
    name: String,
    vserver_name: String,
    vpc_id: String,
    eip: EipSpec,
}

impl LoadBalancerKind {
    pub(crate) fn new(spec: &UlbSpec, cluster: &str, vpc_id: &str) -> Self {
        Self {
            id: spec.load_balancer_id.clone(),
            name: if spec.load_balancer_name.is_empty() {
                format!("ulb-for-{cluster}")
            } else {
                spec.load_balancer_name.clone()
            },
            vserver_name: if spec.vserver_name.is_empty() {
                DEFAULT_VSERVER_NAME.to_string()
            } else {
                spec.vserver_name.clone()
            },
            vpc_id: vpc_id.to_string(),
            eip: spec.eip.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceKind for LoadBalancerKind {
    type Remote = LoadBalancer;
    const KIND: &'static str = "load balancer";

    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
        &status.network.ulb.load_balancer_id
    }

    fn wanted_id(&self) -> &str {
        &self.id
    }

    fn wanted_name(&self) -> &str {
        &self.name
    }

    fn parents(&self) -> Vec<(&'static str, &str)> {
        vec![("vpc", &self.vpc_id)]
    }

    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<LoadBalancer>, UCloudError> {
        let filter = ResourceFilter::default().in_vpc(&self.vpc_id).with_id(&self.id);
        cloud.cloud.describe_load_balancers(cloud.ctx, &filter).await
    }

    fn matches(&self, remote: &LoadBalancer) -> bool {
        self.is_wanted(&remote.name, &remote.ulb_id) && remote.vpc_id == self.vpc_id
    }

    async fn create(&self, cloud: &CloudContext<'_>) -> Result<LoadBalancer, ControllerError> {
        let request = CreateLoadBalancerRequest {
            ulb_name: self.name.clone(),
            vpc_id: self.vpc_id.clone(),
            listen_type: LISTEN_TYPE.to_string(),
            tag: cloud.tag.to_string(),
        };
        let ulb_id = cloud.cloud.create_load_balancer(cloud.ctx, &request).await?;
        info!("Created ULB {} ({}) in VPC {}", self.name, ulb_id, self.vpc_id);

        let eip = allocate_eip(cloud, &self.eip).await?;
        cloud.cloud.bind_eip(cloud.ctx, &eip.eip_id, &ulb_id, "ulb").await?;
        info!("Bound EIP {} to ULB {}", eip.eip_id, ulb_id);

        let vserver = CreateVServerRequest {
            ulb_id: ulb_id.clone(),
            vserver_name: self.vserver_name.clone(),
            protocol: "TCP".to_string(),
            frontend_port: API_SERVER_PORT,
            listen_type: LISTEN_TYPE.to_string(),
            monitor_type: "Port".to_string(),
        };
        let vserver_id = cloud.cloud.create_vserver(cloud.ctx, &vserver).await?;
        info!("Created VServer {} ({}) on ULB {} port {}", self.vserver_name, vserver_id, ulb_id, API_SERVER_PORT);

        Ok(LoadBalancer {
            ulb_id,
            name: request.ulb_name,
            vpc_id: request.vpc_id,
            vserver_set: vec![VServer {
                vserver_id,
                vserver_name: vserver.vserver_name,
                frontend_port: vserver.frontend_port,
                backend_set: Vec::new(),
            }],
            ip_set: vec![LoadBalancerIp {
                eip_id: eip.eip_id.clone(),
                eip: eip.first_address().to_string(),
                bandwidth: eip.bandwidth,
            }],
            tag: request.tag,
        })
    }

    fn publish(&self, remote: LoadBalancer, status: &mut UCloudClusterStatus) {
        let eip = remote
            .ip_set
            .into_iter()
            .next()
            .map(|ip| EipStatus {
                eip_id: ip.eip_id,
                eip_addr: ip.eip,
                bandwidth: ip.bandwidth,
                eip_name: self.eip.eip_name.clone(),
            })
            .unwrap_or_default();
        status.network.ulb = UlbStatus {
            load_balancer_id: remote.ulb_id,
            load_balancer_name: remote.name,
            vpc_id: remote.vpc_id,
            vserver_id: remote.vserver_set.into_iter().next().map(|v| v.vserver_id).unwrap_or_default(),
            eip,
        };
    }

    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
        cloud.cloud.delete_load_balancer(cloud.ctx, id, true).await
    }

    fn gone_code(&self) -> Option<i64> {
        Some(retcode::ULB_NOT_FOUND)
    }

    fn clear(&self, status: &mut UCloudClusterStatus) {
        status.network.ulb = Default::default();
    }
}

/// Fill in the load balancer address once the provider has assigned it
pub(crate) async fn refresh_eip_address(
    cloud: &CloudContext<'_>,
    ulb: &mut UlbStatus,
) -> Result<(), ControllerError> {
    if !ulb.eip.eip_addr.is_empty() || ulb.eip.eip_id.is_empty() {
        return Ok(());
    }
    let filter = ResourceFilter::default().with_id(&ulb.eip.eip_id);
    let eips = cloud
        .cloud
        .describe_eips(cloud.ctx, &filter)
        .await
        .map_err(|e| ControllerError::reconcile("EIP", &ulb.eip.eip_id, e.into()))?;
    if let Some(eip) = eips.iter().find(|e| e.eip_id == ulb.eip.eip_id) {
        ulb.eip.eip_addr = eip.first_address().to_string();
        if ulb.eip.eip_name.is_empty() {
            ulb.eip.eip_name.clone_from(&eip.name);
        }
    }
    debug!("EIP {} of ULB {} has address {:?}", ulb.eip.eip_id, ulb.load_balancer_id, ulb.eip.eip_addr);
    Ok(())
}

async fn api_server_vserver(
    cloud: &dyn UCloudClientTrait,
    ctx: &RequestContext,
    ulb: &UlbStatus,
) -> Result<Option<VServer>, UCloudError> {
    Ok(cloud
        .describe_vservers(ctx, &ulb.load_balancer_id, &ulb.vserver_id)
        .await?
        .into_iter()
        .next())
}

/// Add an instance as backend of the API server VServer unless it already is one
pub(crate) async fn add_backend(
    cloud: &dyn UCloudClientTrait,
    ctx: &RequestContext,
    ulb: &UlbStatus,
    instance_id: &str,
) -> Result<(), ControllerError> {
    let wrap = |e: ControllerError| ControllerError::reconcile("ULB backend", instance_id, e);
    let vserver = api_server_vserver(cloud, ctx, ulb)
        .await
        .map_err(|e| wrap(e.into()))?
        .ok_or_else(|| {
            wrap(ControllerError::VServerNotFound {
                ulb_id: ulb.load_balancer_id.clone(),
                vserver_id: ulb.vserver_id.clone(),
            })
        })?;
    if vserver.backend_set.iter().any(|b| b.resource_id == instance_id) {
        debug!("uhost {} is already a backend of ULB {}", instance_id, ulb.load_balancer_id);
        return Ok(());
    }

    let request = AllocateBackendRequest {
        ulb_id: ulb.load_balancer_id.clone(),
        vserver_id: vserver.vserver_id,
        resource_id: instance_id.to_string(),
        resource_type: "UHost".to_string(),
        port: API_SERVER_PORT,
    };
    let backend_id = cloud.allocate_backend(ctx, &request).await.map_err(|e| wrap(e.into()))?;
    info!("Added uhost {} to ULB {} as backend {}", instance_id, ulb.load_balancer_id, backend_id);
    Ok(())
}

/// Remove an instance from the API server VServer if it is a backend
pub(crate) async fn remove_backend(
    cloud: &dyn UCloudClientTrait,
    ctx: &RequestContext,
    ulb: &UlbStatus,
    instance_id: &str,
) -> Result<(), ControllerError> {
    if ulb.load_balancer_id.is_empty() {
        return Ok(());
    }
    let wrap = |e: UCloudError| ControllerError::reconcile("ULB backend", instance_id, e.into());
    let Some(vserver) = api_server_vserver(cloud, ctx, ulb).await.map_err(wrap)? else {
        debug!("VServer {} of ULB {} is gone, no backend to remove", ulb.vserver_id, ulb.load_balancer_id);
        return Ok(());
    };
    let Some(backend) = vserver.backend_set.iter().find(|b| b.resource_id == instance_id) else {
        debug!("uhost {} is not a backend of ULB {}", instance_id, ulb.load_balancer_id);
        return Ok(());
    };
    cloud
        .release_backend(ctx, &ulb.load_balancer_id, &backend.backend_id)
        .await
        .map_err(wrap)?;
    info!("Removed uhost {} (backend {}) from ULB {}", instance_id, backend.backend_id, ulb.load_balancer_id);
    Ok(())
}
