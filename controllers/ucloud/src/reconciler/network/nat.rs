//! NAT gateway reconciler
//!
//! A new gateway needs the subnet it serves, a firewall and a freshly
//! allocated elastic IP. The EIP is not released if the gateway create fails;
//! the business group sweep and the provider console are the cleanup path.

use super::eip::{allocate_eip, eip_status};
use super::firewall::resolve_firewall;
use crate::error::ControllerError;
use crate::reconcile_helpers::{CloudContext, ResourceKind};
use crds::{EipSpec, EipStatus, FirewallStatus, NatSpec, NatStatus, UCloudClusterStatus};
use tracing::info;
use ucloud_client::{CreateNatGatewayRequest, Firewall, NatGateway, ResourceFilter, UCloudError, retcode};

/// A gateway together with the firewall and EIP it was created with
#[derive(Debug, Clone)]
pub(crate) struct NatRecord {
    gateway: NatGateway,
    firewall: Firewall,
    eip: EipStatus,
}

impl From<NatGateway> for NatRecord {
    fn from(gateway: NatGateway) -> Self {
        let firewall = Firewall {
            fw_id: gateway.firewall_id.clone(),
            ..Default::default()
        };
        let eip = gateway
            .ip_set
            .first()
            .map(|ip| EipStatus {
                eip_id: ip.eip_id.clone(),
                bandwidth: ip.bandwidth,
                ..Default::default()
            })
            .unwrap_or_default();
        Self { gateway, firewall, eip }
    }
}

/// The cluster NAT gateway, owned by the cluster VPC
#[derive(Debug)]
pub(crate) struct NatGatewayKind {
    id: String,
    name: String,
    vpc_id: String,
    subnet_id: String,
    firewall_id: String,
    eip: EipSpec,
}

impl NatGatewayKind {
    pub(crate) fn new(spec: &NatSpec, firewall_id: &str, cluster: &str, status: &UCloudClusterStatus) -> Self {
        Self {
            id: spec.nat_gateway.nat_gateway_id.clone(),
            name: if spec.nat_gateway.name.is_empty() {
                format!("natgw-for-{cluster}")
            } else {
                spec.nat_gateway.name.clone()
            },
            vpc_id: status.network.vpc.vpc_id.clone(),
            subnet_id: status.network.subnet.subnet_id.clone(),
            firewall_id: firewall_id.to_string(),
            eip: spec.eip.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceKind for NatGatewayKind {
    type Remote = NatRecord;
    const KIND: &'static str = "NAT gateway";

    fn recorded_id<'s>(&self, status: &'s UCloudClusterStatus) -> &'s str {
        &status.network.nat.nat_gateway_id
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

    async fn describe(&self, cloud: &CloudContext<'_>) -> Result<Vec<NatRecord>, UCloudError> {
        let filter = ResourceFilter::default().with_id(&self.id);
        let gateways = cloud.cloud.describe_nat_gateways(cloud.ctx, &filter).await?;
        Ok(gateways.into_iter().map(NatRecord::from).collect())
    }

    fn matches(&self, remote: &NatRecord) -> bool {
        self.is_wanted(&remote.gateway.natgw_name, &remote.gateway.natgw_id) && remote.gateway.vpc_id == self.vpc_id
    }

    async fn create(&self, cloud: &CloudContext<'_>) -> Result<NatRecord, ControllerError> {
        if self.subnet_id.is_empty() {
            return Err(ControllerError::ParentNotCreated { kind: Self::KIND, parent: "subnet" });
        }
        let firewall = resolve_firewall(cloud, &self.firewall_id).await?;
        let eip = allocate_eip(cloud, &self.eip).await?;

        let request = CreateNatGatewayRequest {
            natgw_name: self.name.clone(),
            vpc_id: self.vpc_id.clone(),
            subnetwork_ids: vec![self.subnet_id.clone()],
            eip_ids: vec![eip.eip_id.clone()],
            firewall_id: firewall.fw_id.clone(),
            tag: cloud.tag.to_string(),
        };
        let natgw_id = cloud.cloud.create_nat_gateway(cloud.ctx, &request).await?;
        info!(
            "Created NAT gateway {} ({}) in VPC {} with EIP {} and firewall {}",
            self.name, natgw_id, self.vpc_id, eip.eip_id, firewall.fw_id
        );

        Ok(NatRecord {
            gateway: NatGateway {
                natgw_id,
                natgw_name: request.natgw_name,
                vpc_id: request.vpc_id,
                firewall_id: request.firewall_id,
                ip_set: Vec::new(),
                tag: request.tag,
            },
            eip: eip_status(&eip),
            firewall,
        })
    }

    fn publish(&self, remote: NatRecord, status: &mut UCloudClusterStatus) {
        let firewall = FirewallStatus {
            firewall_id: remote.firewall.fw_id,
            firewall_name: remote.firewall.name,
            firewall_type: remote.firewall.firewall_type,
        };
        status.network.firewall = firewall.clone();
        status.network.nat = NatStatus {
            nat_gateway_id: remote.gateway.natgw_id,
            name: remote.gateway.natgw_name,
            vpc_id: remote.gateway.vpc_id,
            firewall,
            eip: remote.eip,
        };
    }

    async fn delete(&self, cloud: &CloudContext<'_>, id: &str) -> Result<(), UCloudError> {
        cloud.cloud.delete_nat_gateway(cloud.ctx, id, true).await
    }

    fn gone_code(&self) -> Option<i64> {
        Some(retcode::NAT_GATEWAY_NOT_FOUND)
    }

    fn clear(&self, status: &mut UCloudClusterStatus) {
        status.network.nat = Default::default();
    }
}
